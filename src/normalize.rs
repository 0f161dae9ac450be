//! Input normalization run once before any block or span pass.

/// Normalize line endings, expand tabs, blank out whitespace-only lines,
/// reserve `~` and `$` behind sentinels and pad the text with blank lines.
pub(crate) fn normalize(text: &str, tab_width: usize) -> String {
    let text = text.replace("\r\n", "\n").replace('\r', "\n");
    // Columns are counted on the original characters, before `~` and `$`
    // turn into two-character sentinels.
    let text = detab(&text, tab_width);
    let text = strip_blank_lines(&text);
    let text = text.replace('~', "~T").replace('$', "~D");
    format!("\n\n{text}\n\n")
}

/// Undo the `~`/`$` reservation done by [`normalize`].
pub(crate) fn restore_reserved(text: &str) -> String {
    text.replace("~D", "$").replace("~T", "~")
}

/// Expand tabs to the next multiple of `tab_width`, measured per line.
pub(crate) fn detab(text: &str, tab_width: usize) -> String {
    if !text.contains('\t') {
        return text.to_owned();
    }
    let mut out = String::with_capacity(text.len());
    let mut column = 0;
    for c in text.chars() {
        match c {
            '\t' => {
                let pad = tab_width - column % tab_width;
                out.extend(std::iter::repeat_n(' ', pad));
                column += pad;
            }
            '\n' => {
                out.push(c);
                column = 0;
            }
            _ => {
                out.push(c);
                column += 1;
            }
        }
    }
    out
}

fn strip_blank_lines(text: &str) -> String {
    text.split('\n')
        .map(|line| {
            if line.bytes().all(|b| b == b' ' || b == b'\t') {
                ""
            } else {
                line
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}
