use std::{fmt, fs, io, path::Path};

#[derive(Clone, Debug, PartialEq)]
enum Line {
    Entry { key: String, value: String },
    /// Comments and blank lines, kept verbatim.
    Other(String),
}

#[derive(Clone, Debug, PartialEq)]
struct Section {
    name: String,
    lines: Vec<Line>,
}

/// A minimal INI-style key file that keeps unknown lines and ordering intact across edits.
#[derive(Clone, Debug, PartialEq)]
pub struct KeyFile {
    // the first section is the unnamed preamble
    sections: Vec<Section>,
}

impl KeyFile {
    pub fn new() -> Self {
        Self { sections: vec![Section { name: String::new(), lines: Vec::new() }] }
    }

    pub fn parse(text: &str) -> Self {
        let Self { mut sections } = Self::new();
        for raw in text.lines() {
            let trimmed = raw.trim();
            if trimmed.starts_with('[') && trimmed.ends_with(']') {
                let name = trimmed[1..trimmed.len() - 1].trim().to_string();
                sections.push(Section { name, lines: Vec::new() });
                continue;
            }

            let line = match trimmed.split_once('=') {
                Some((key, value)) if !trimmed.starts_with('#') && !trimmed.starts_with(';') => Line::Entry {
                    key: key.trim().to_string(),
                    value: value.trim().to_string(),
                },
                _ => Line::Other(raw.to_string()),
            };
            if let Some(current) = sections.last_mut() {
                current.lines.push(line);
            }
        }
        Self { sections }
    }

    pub fn load(path: &Path) -> io::Result<Self> {
        Ok(Self::parse(&fs::read_to_string(path)?))
    }

    pub fn save(&self, path: &Path) -> io::Result<()> {
        fs::write(path, self.to_string())
    }

    pub fn get(&self, section: &str, key: &str) -> Option<&str> {
        self.section(section)?.lines.iter().find_map(|line| match line {
            Line::Entry { key: k, value } if k == key => Some(value.as_str()),
            _ => None,
        })
    }

    pub fn set(&mut self, section: &str, key: &str, value: impl Into<String>) {
        let value = value.into();
        let idx = match self.sections.iter().position(|s| !s.name.is_empty() && s.name == section) {
            Some(idx) => idx,
            None => {
                self.sections.push(Section { name: section.to_string(), lines: Vec::new() });
                self.sections.len() - 1
            }
        };

        let lines = &mut self.sections[idx].lines;
        for line in lines.iter_mut() {
            if let Line::Entry { key: k, value: v } = line {
                if k == key {
                    *v = value;
                    return;
                }
            }
        }
        lines.push(Line::Entry { key: key.to_string(), value });
    }

    /// Remove a key. Returns true if it was present.
    pub fn remove(&mut self, section: &str, key: &str) -> bool {
        let Some(section) = self.sections.iter_mut().find(|s| !s.name.is_empty() && s.name == section) else {
            return false;
        };
        let before = section.lines.len();
        section.lines.retain(|line| !matches!(line, Line::Entry { key: k, .. } if k == key));
        section.lines.len() != before
    }

    fn section(&self, name: &str) -> Option<&Section> {
        self.sections.iter().find(|s| !s.name.is_empty() && s.name == name)
    }
}

impl Default for KeyFile {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for KeyFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for section in &self.sections {
            if !section.name.is_empty() {
                writeln!(f, "[{}]", section.name)?;
            }
            for line in &section.lines {
                match line {
                    Line::Entry { key, value } => writeln!(f, "{}={}", key, value)?,
                    Line::Other(raw) => writeln!(f, "{}", raw)?,
                }
            }
        }
        Ok(())
    }
}
