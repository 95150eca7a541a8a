//! Pattern Removal
//!
//! Prefix/suffix stripping for `${v#pat}`, `${v##pat}`, `${v%pat}` and
//! `${v%%pat}`.

use regex_lite::Regex;

/// Side for pattern removal
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PatternRemovalSide {
    Prefix,
    Suffix,
}

impl PatternRemovalSide {
    /// `#`/`##` strip a prefix, `%`/`%%` a suffix; doubled forms are greedy.
    pub fn from_operator(op: &str) -> Option<(Self, bool)> {
        match op {
            "#" => Some((PatternRemovalSide::Prefix, false)),
            "##" => Some((PatternRemovalSide::Prefix, true)),
            "%" => Some((PatternRemovalSide::Suffix, false)),
            "%%" => Some((PatternRemovalSide::Suffix, true)),
            _ => None,
        }
    }
}

/// Strip the shortest (or, when `greedy`, longest) match of `regex_str`
/// from one side of `value`. An invalid regex leaves the value unchanged.
pub fn apply_pattern_removal(
    value: &str,
    regex_str: &str,
    side: PatternRemovalSide,
    greedy: bool,
) -> String {
    match side {
        PatternRemovalSide::Prefix => match Regex::new(&format!("^(?:{})", regex_str)) {
            // the regex itself carries the laziness of `*`
            Ok(re) => re.replace(value, "").into_owned(),
            Err(_) => value.to_string(),
        },
        PatternRemovalSide::Suffix => {
            let Ok(re) = Regex::new(&format!("^(?:{})$", regex_str)) else {
                return value.to_string();
            };
            let boundaries: Vec<usize> = value
                .char_indices()
                .map(|(i, _)| i)
                .chain(std::iter::once(value.len()))
                .collect();
            // longest suffix starts at the leftmost boundary that matches
            let mut candidates: Box<dyn Iterator<Item = &usize>> = if greedy {
                Box::new(boundaries.iter())
            } else {
                Box::new(boundaries.iter().rev())
            };
            match candidates.find(|&&start| re.is_match(&value[start..])) {
                Some(&start) => value[..start].to_string(),
                None => value.to_string(),
            }
        }
    }
}
