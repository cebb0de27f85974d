use colored::*;

/// Boxed title line shown when a pipeline starts
pub struct Banner {
    text: String,
}

impl Banner {
    /// Creates a banner with the given title
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }

    /// Renders the banner with a colored border
    pub fn render(&self) -> String {
        let width = self.text.chars().count() + 4;
        let border = "=".repeat(width);

        format!(
            "\n{}\n{}{}{}\n{}\n",
            border.bright_red(),
            "| ".bright_red(),
            self.text.bright_white().bold(),
            " |".bright_red(),
            border.bright_red()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_contains_text() {
        colored::control::set_override(false);
        let rendered = Banner::new("RubyGems downloader").render();
        assert!(rendered.contains("| RubyGems downloader |"));
        assert!(rendered.contains(&"=".repeat(23)));
    }
}
