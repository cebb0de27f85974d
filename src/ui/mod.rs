/// Title banner
pub mod banner;
/// Outcome aggregation and progress bars
pub mod progress;

use colored::*;

pub use banner::Banner;
pub use progress::{Aggregator, ProgressLabels};

/// Clears the terminal and prints the greeting banner
pub fn show_greeting(title: &str) {
    let term = console::Term::stdout();
    if term.is_term() {
        let _ = term.clear_screen();
    }
    println!("{}", Banner::new(title).render());
}

/// Prints an informational line
pub fn print_info(message: &str) {
    println!("{}", message.green());
}

/// Prints a warning line
pub fn print_warning(message: &str) {
    println!("{}", message.yellow());
}

/// Prints an error line to stderr
pub fn print_error(message: &str) {
    eprintln!("{}", message.red());
}
