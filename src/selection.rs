use std::fmt;
use std::str::FromStr;

use anyhow::{Context, Result, bail};

/// Which inventory items to process, by 1-based position: `all`, a range
/// like `2-5`, or a list like `1,4,7`.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Selection {
    #[default]
    All,
    Range { start: usize, end: usize },
    Indices(Vec<usize>),
}

impl FromStr for Selection {
    type Err = anyhow::Error;

    fn from_str(input: &str) -> Result<Self> {
        let normalized: String = input
            .chars()
            .filter(|character| !character.is_whitespace())
            .collect::<String>()
            .to_lowercase();

        if normalized.is_empty() {
            bail!("selection is empty");
        }
        if normalized == "all" {
            return Ok(Self::All);
        }

        if let Some((start, end)) = normalized.split_once('-') {
            let start = start
                .parse::<usize>()
                .with_context(|| format!("invalid range start in selection: {input}"))?;
            let end = end
                .parse::<usize>()
                .with_context(|| format!("invalid range end in selection: {input}"))?;
            if start == 0 || start > end {
                bail!("invalid selection range: {input}");
            }
            return Ok(Self::Range { start, end });
        }

        let indices = normalized
            .split(',')
            .map(|value| {
                value
                    .parse::<usize>()
                    .with_context(|| format!("invalid index in selection: {input}"))
            })
            .collect::<Result<Vec<usize>>>()?;
        if indices.contains(&0) {
            bail!("selection indices are 1-based: {input}");
        }

        Ok(Self::Indices(indices))
    }
}

impl fmt::Display for Selection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::All => write!(f, "all"),
            Self::Range { start, end } => write!(f, "{start}-{end}"),
            Self::Indices(indices) => {
                let joined: Vec<String> = indices.iter().map(ToString::to_string).collect();
                write!(f, "{}", joined.join(","))
            }
        }
    }
}

impl Selection {
    pub fn apply<T: Clone>(&self, items: &[T]) -> Result<Vec<T>> {
        match self {
            Self::All => Ok(items.to_vec()),
            Self::Range { start, end } => {
                let end = (*end).min(items.len());
                if *start > end {
                    return Ok(Vec::new());
                }
                Ok(items[start - 1..end].to_vec())
            }
            Self::Indices(indices) => indices
                .iter()
                .map(|index| {
                    items.get(index - 1).cloned().with_context(|| {
                        format!("selection index {} out of range (1-{})", index, items.len())
                    })
                })
                .collect(),
        }
    }
}

pub fn apply_limit<T>(mut items: Vec<T>, limit: Option<usize>) -> Vec<T> {
    if let Some(limit) = limit {
        items.truncate(limit);
    }
    items
}
