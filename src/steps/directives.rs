// file: src/steps/directives.rs
// version: 1.0.0
// guid: b84e0d2a-5f71-4c3b-9e16-a2d7c8f05b39

//! Structured editing of `keyword value` configuration files such as sshd_config

/// Line-preserving directive map.
///
/// Only the global section (everything before the first active `Match`
/// block) is edited; directives inside `Match` blocks are conditional and are
/// left alone. Keywords compare case-insensitively, as sshd does.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectiveMap {
    lines: Vec<String>,
}

#[derive(Debug, PartialEq, Eq)]
struct Directive<'a> {
    keyword: &'a str,
    value: &'a str,
    commented: bool,
}

fn classify(line: &str) -> Option<Directive<'_>> {
    let trimmed = line.trim();
    let (commented, body) = match trimmed.strip_prefix('#') {
        Some(rest) => (true, rest.trim_start()),
        None => (false, trimmed),
    };
    if body.is_empty() {
        return None;
    }

    let split_at = body
        .find(|c: char| c.is_whitespace() || c == '=')
        .unwrap_or(body.len());
    let keyword = &body[..split_at];
    let value = body[split_at..]
        .trim_start_matches(|c: char| c.is_whitespace() || c == '=')
        .trim_end();

    if keyword.is_empty() || !keyword.chars().all(|c| c.is_ascii_alphanumeric()) {
        return None;
    }

    // Prose comments ("# Port forwarding is ...") are not disabled directives
    if commented && (value.is_empty() || value.split_whitespace().count() != 1) {
        return None;
    }

    Some(Directive {
        keyword,
        value,
        commented,
    })
}

impl DirectiveMap {
    pub fn parse(content: &str) -> Self {
        Self {
            lines: content.lines().map(str::to_string).collect(),
        }
    }

    /// Index one past the global section
    fn global_end(&self) -> usize {
        self.lines
            .iter()
            .position(|line| {
                classify(line)
                    .map(|d| !d.commented && d.keyword.eq_ignore_ascii_case("Match"))
                    .unwrap_or(false)
            })
            .unwrap_or(self.lines.len())
    }

    fn matches(line: &str, key: &str) -> Option<bool> {
        classify(line)
            .filter(|d| d.keyword.eq_ignore_ascii_case(key))
            .map(|d| d.commented)
    }

    /// First active value of a global directive
    pub fn get(&self, key: &str) -> Option<&str> {
        self.lines[..self.global_end()]
            .iter()
            .filter_map(|line| classify(line))
            .find(|d| !d.commented && d.keyword.eq_ignore_ascii_case(key))
            .map(|d| d.value)
    }

    /// Set a global directive.
    ///
    /// The first occurrence, commented out or not, is rewritten in place and
    /// later active duplicates are dropped. A missing directive is inserted
    /// before the first `Match` block, or appended when there is none.
    pub fn set(&mut self, key: &str, value: &str) {
        if !self.replace(key, value) {
            let at = self.global_end();
            self.lines.insert(at, format!("{} {}", key, value));
        }
    }

    /// Rewrite a directive only where it already appears active.
    /// Returns whether the file changed.
    pub fn set_existing(&mut self, key: &str, value: &str) -> bool {
        let end = self.global_end();
        let present = self.lines[..end]
            .iter()
            .any(|line| Self::matches(line, key) == Some(false));
        if !present || (self.get(key) == Some(value) && self.active_count(key) == 1) {
            return false;
        }
        self.replace(key, value)
    }

    fn active_count(&self, key: &str) -> usize {
        self.lines[..self.global_end()]
            .iter()
            .filter(|line| Self::matches(line, key) == Some(false))
            .count()
    }

    fn replace(&mut self, key: &str, value: &str) -> bool {
        let end = self.global_end();
        let Some(first) = self.lines[..end]
            .iter()
            .position(|line| Self::matches(line, key).is_some())
        else {
            return false;
        };

        self.lines[first] = format!("{} {}", key, value);

        let mut index = first + 1;
        let mut end = end;
        while index < end {
            if Self::matches(&self.lines[index], key) == Some(false) {
                self.lines.remove(index);
                end -= 1;
            } else {
                index += 1;
            }
        }
        true
    }

    pub fn render(&self) -> String {
        let mut out = self.lines.join("\n");
        out.push('\n');
        out
    }
}
