//! Version command

use anyhow::Result;

/// Run the version command.
///
/// # Errors
///
/// Returns an error if JSON serialization fails.
pub fn run(json: bool) -> Result<()> {
    let version = env!("CARGO_PKG_VERSION");

    if json {
        let obj = serde_json::json!({ "name": "rigger", "version": version });
        println!("{}", serde_json::to_string_pretty(&obj)?);
    } else {
        println!("rigger {version}");
    }
    Ok(())
}
