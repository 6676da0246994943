/// Returns the text of the 1-based `line` in `source`, without its newline.
/// Only called on error paths, so the linear scan is acceptable.
#[must_use]
pub fn line_text(source: &str, line: usize) -> Option<&str> {
    if line == 0 {
        return None;
    }
    source.lines().nth(line - 1)
}

/// Calculates the byte offset of a 1-based line/column position in `source`.
/// Columns count characters, matching the lexer's bookkeeping. Like
/// [`line_text`], this walks the source and is meant for error reporting only.
#[must_use]
pub fn offset_of(source: &str, line: usize, column: usize) -> usize {
    let mut cur_line = 1;
    let mut cur_col = 1;
    for (offset, ch) in source.char_indices() {
        if cur_line == line && cur_col == column {
            return offset;
        }
        if ch == '\n' {
            cur_line += 1;
            cur_col = 1;
        } else {
            cur_col += 1;
        }
    }
    source.len()
}
