//! Small helpers for composing chat lines.

use std::fmt::Display;

/// Join items as natural-language prose: `A`, `A and B`, `A, B and C`.
pub fn andify<T: Display>(items: &[T]) -> String {
    match items {
        [] => String::new(),
        [only] => only.to_string(),
        [init @ .., last] => {
            let head: Vec<String> = init.iter().map(ToString::to_string).collect();
            format!("{} and {last}", head.join(", "))
        }
    }
}
