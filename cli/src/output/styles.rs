//! Output styles using owo-colors stylesheet pattern

use owo_colors::Style;

/// Centralized stylesheet. Every field is plain until [`Styles::colorize`].
#[derive(Default, Clone)]
pub struct Styles {
    pub success: Style,
    pub warning: Style,
    pub error: Style,
    pub info: Style,
    /// Secondary text, including echoed remote output.
    pub dim: Style,
    pub bold: Style,
    /// Step headings and summary titles.
    pub header: Style,
    /// Echoed remote commands.
    pub command: Style,
    /// Text of security alerts.
    pub alert: Style,
}

impl Styles {
    pub fn colorize(&mut self) {
        self.success = Style::new().green();
        self.warning = Style::new().yellow();
        self.error = Style::new().red();
        self.info = Style::new().blue();
        self.dim = Style::new().dimmed();
        self.bold = Style::new().bold();
        self.header = Style::new().bold().cyan();
        self.command = Style::new().magenta();
        self.alert = Style::new().bold().yellow();
    }
}
