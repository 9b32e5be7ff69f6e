use super::RenderError;

/// Whole-word wrapping: lines never break mid-word, so a word wider than the
/// usable width is unmeasurable content.
///
/// Paragraph breaks (`\n`) are preserved as empty output lines between
/// wrapped paragraphs.
pub(crate) fn wrap_words(text: &str, width: usize) -> Result<Vec<String>, RenderError> {
    let mut lines = Vec::new();

    for (index, paragraph) in text.split('\n').enumerate() {
        if index > 0 {
            lines.push(String::new());
        }

        let mut current = String::new();
        for word in paragraph.split_whitespace() {
            let word_width = word.chars().count();
            if word_width > width {
                return Err(RenderError::UnmeasurableContent {
                    word: word.to_string(),
                    width,
                });
            }

            if current.is_empty() {
                current.push_str(word);
            } else if current.chars().count() + 1 + word_width <= width {
                current.push(' ');
                current.push_str(word);
            } else {
                lines.push(std::mem::take(&mut current));
                current.push_str(word);
            }
        }

        if !current.is_empty() {
            lines.push(current);
        }
    }

    // Trailing blank paragraphs collapse; a fully blank input wraps to nothing.
    while lines.last().is_some_and(|line| line.is_empty()) {
        lines.pop();
    }

    Ok(lines)
}
