//! Maven 互換のバージョン順序。
//!
//! `1.0-alpha < 1.0-beta < 1.0-rc1 < 1.0-SNAPSHOT < 1.0 < 1.0-sp1 < 1.0.1` となるように
//! トークン単位で比較する。末尾の 0 やリリース修飾子は無視されるので `1.0 == 1.0.0`。

use std::cmp::Ordering;
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Item {
    Number(String),
    Qualifier(i8),
    Text(String),
}

impl Item {
    fn parse(token: &str) -> Self {
        if !token.is_empty() && token.bytes().all(|byte| byte.is_ascii_digit()) {
            let trimmed = token.trim_start_matches('0');
            let digits = if trimmed.is_empty() { "0" } else { trimmed };
            return Item::Number(digits.to_string());
        }
        let lowered = token.to_ascii_lowercase();
        match known_qualifier(&lowered) {
            Some(rank) => Item::Qualifier(rank),
            None => Item::Text(lowered),
        }
    }

    /// 比較相手が欠けている位置で使う中立要素。
    fn padding_for(other: &Item) -> Item {
        match other {
            Item::Number(_) => Item::Number("0".to_string()),
            _ => Item::Qualifier(0),
        }
    }

    fn compare(&self, other: &Item) -> Ordering {
        match (self, other) {
            (Item::Number(left), Item::Number(right)) => left
                .len()
                .cmp(&right.len())
                .then_with(|| left.cmp(right)),
            (Item::Number(_), _) => Ordering::Greater,
            (_, Item::Number(_)) => Ordering::Less,
            (Item::Qualifier(left), Item::Qualifier(right)) => left.cmp(right),
            (Item::Qualifier(_), Item::Text(_)) => Ordering::Less,
            (Item::Text(_), Item::Qualifier(_)) => Ordering::Greater,
            (Item::Text(left), Item::Text(right)) => left.cmp(right),
        }
    }
}

fn known_qualifier(value: &str) -> Option<i8> {
    match value {
        "alpha" | "a" => Some(-5),
        "beta" | "b" => Some(-4),
        "milestone" | "m" => Some(-3),
        "rc" | "cr" => Some(-2),
        "snapshot" => Some(-1),
        "" | "ga" | "final" | "release" => Some(0),
        "sp" => Some(1),
        _ => None,
    }
}

fn tokenize(version: &str) -> Vec<Item> {
    let mut items = Vec::new();
    let mut current = String::new();
    let mut current_is_digit: Option<bool> = None;

    for ch in version.trim().chars() {
        if matches!(ch, '.' | '-' | '_') {
            if !current.is_empty() {
                items.push(Item::parse(&current));
                current.clear();
            }
            current_is_digit = None;
            continue;
        }
        let is_digit = ch.is_ascii_digit();
        if let Some(previous) = current_is_digit {
            if previous != is_digit && !current.is_empty() {
                items.push(Item::parse(&current));
                current.clear();
            }
        }
        current.push(ch);
        current_is_digit = Some(is_digit);
    }
    if !current.is_empty() {
        items.push(Item::parse(&current));
    }
    items
}

/// 比較可能なバージョン文字列。
#[derive(Debug, Clone)]
pub struct Version {
    raw: String,
    items: Vec<Item>,
}

impl Version {
    pub fn parse(raw: impl Into<String>) -> Self {
        let raw = raw.into();
        let items = tokenize(&raw);
        Self { raw, items }
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

impl Ord for Version {
    fn cmp(&self, other: &Self) -> Ordering {
        let length = self.items.len().max(other.items.len());
        for index in 0..length {
            let ordering = match (self.items.get(index), other.items.get(index)) {
                (Some(left), Some(right)) => left.compare(right),
                (Some(left), None) => left.compare(&Item::padding_for(left)),
                (None, Some(right)) => Item::padding_for(right).compare(right),
                (None, None) => Ordering::Equal,
            };
            if ordering != Ordering::Equal {
                return ordering;
            }
        }
        Ordering::Equal
    }
}

impl PartialOrd for Version {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for Version {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Version {}

pub fn compare_versions(left: &str, right: &str) -> Ordering {
    Version::parse(left).cmp(&Version::parse(right))
}

/// 与えられたバージョンのうち最大のもの。同順位なら先に現れたものを返す。
pub fn highest_version<'a, I>(versions: I) -> Option<&'a str>
where
    I: IntoIterator<Item = &'a str>,
{
    let mut best: Option<&'a str> = None;
    for candidate in versions {
        match best {
            Some(current) if compare_versions(candidate, current) != Ordering::Greater => {}
            _ => best = Some(candidate),
        }
    }
    best
}
