//! Markdown element decomposition: pipe tables become objects, the rest is
//! split into prose elements.

use super::{split_prose, Element, ElementDecomposer};
use hr_core::{AppError, AppResult};

#[derive(Debug, Clone)]
pub struct MarkdownElementDecomposer {
    chunk_size: usize,
}

impl MarkdownElementDecomposer {
    pub fn new(chunk_size: usize) -> Self {
        Self { chunk_size }
    }
}

enum Block<'a> {
    Prose(Vec<&'a str>),
    Table(Vec<&'a str>),
}

fn is_table_line(line: &str) -> bool {
    line.trim_start().starts_with('|')
}

fn cell_count(row: &str) -> usize {
    let trimmed = row.trim();
    let inner = trimmed.strip_prefix('|').unwrap_or(trimmed);
    let inner = inner.strip_suffix('|').unwrap_or(inner);
    inner.split('|').count()
}

fn heading_text(line: &str) -> Option<&str> {
    let trimmed = line.trim();
    if trimmed.starts_with('#') {
        let title = trimmed.trim_start_matches('#').trim();
        (!title.is_empty()).then_some(title)
    } else {
        None
    }
}

fn blocks(text: &str) -> Vec<Block<'_>> {
    let mut out: Vec<Block<'_>> = Vec::new();
    for line in text.lines() {
        let table = is_table_line(line);
        match out.last_mut() {
            Some(Block::Table(rows)) if table => rows.push(line),
            Some(Block::Prose(lines)) if !table => lines.push(line),
            _ if table => out.push(Block::Table(vec![line])),
            _ => out.push(Block::Prose(vec![line])),
        }
    }

    // A lone pipe line is not a table
    out.into_iter()
        .fold(Vec::new(), |mut acc: Vec<Block<'_>>, block| {
            let block = match block {
                Block::Table(rows) if rows.len() < 2 => Block::Prose(rows),
                other => other,
            };
            match (acc.last_mut(), block) {
                (Some(Block::Prose(prev)), Block::Prose(lines)) => prev.extend(lines),
                (_, block) => acc.push(block),
            }
            acc
        })
}

fn check_table(rows: &[&str]) -> AppResult<()> {
    let expected = cell_count(rows[0]);
    for (i, row) in rows.iter().enumerate().skip(1) {
        let found = cell_count(row);
        if found != expected {
            return Err(AppError::Ingestion(format!(
                "Malformed table: row {} has {} cells, header has {}",
                i + 1,
                found,
                expected
            )));
        }
    }
    Ok(())
}

impl ElementDecomposer for MarkdownElementDecomposer {
    fn decompose(&self, text: &str) -> AppResult<Vec<Element>> {
        let mut elements = Vec::new();
        let mut caption: Option<&str> = None;

        for block in blocks(text) {
            match block {
                Block::Prose(lines) => {
                    if let Some(h) = lines.iter().rev().find_map(|l| heading_text(l)) {
                        caption = Some(h);
                    }
                    let prose = lines.join("\n");
                    elements.extend(
                        split_prose(&prose, self.chunk_size)
                            .into_iter()
                            .map(Element::base),
                    );
                }
                Block::Table(rows) => {
                    check_table(&rows)?;
                    let table = rows
                        .iter()
                        .map(|r| r.trim())
                        .collect::<Vec<_>>()
                        .join("\n");
                    let rendered = match caption {
                        Some(c) => format!("{}\n{}", c, table),
                        None => table,
                    };
                    elements.push(Element::object(rendered));
                }
            }
        }

        Ok(elements)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::UnitKind;

    fn decomposer() -> MarkdownElementDecomposer {
        MarkdownElementDecomposer::new(1024)
    }

    #[test]
    fn test_plain_text_is_one_base_element() {
        let elements = decomposer().decompose("第一條 試用期為三個月").unwrap();
        assert_eq!(elements, vec![Element::base("第一條 試用期為三個月")]);
    }

    #[test]
    fn test_table_becomes_object_with_caption() {
        let text = "## 特別休假日數\n依年資計算如下：\n\
                    | 年資 | 日數 |\n\
                    |---|---|\n\
                    | 六個月以上一年未滿 | 三日 |\n\
                    | 一年以上二年未滿 | 七日 |\n\
                    以上為最低標準。";

        let elements = decomposer().decompose(text).unwrap();
        let kinds: Vec<UnitKind> = elements.iter().map(|e| e.kind).collect();
        assert_eq!(kinds, vec![UnitKind::Base, UnitKind::Object, UnitKind::Base]);

        assert!(elements[1].text.starts_with("特別休假日數\n| 年資 | 日數 |"));
        assert!(elements[1].text.contains("| 一年以上二年未滿 | 七日 |"));
        assert_eq!(elements[2].text, "以上為最低標準。");
    }

    #[test]
    fn test_single_pipe_line_is_prose() {
        let elements = decomposer().decompose("說明\n| 僅一行").unwrap();
        assert_eq!(elements.len(), 1);
        assert_eq!(elements[0].kind, UnitKind::Base);
        assert!(elements[0].text.contains("| 僅一行"));
    }

    #[test]
    fn test_ragged_table_is_error() {
        let text = "| a | b |\n|---|---|\n| 1 | 2 | 3 |";
        assert!(decomposer().decompose(text).is_err());
    }

    #[test]
    fn test_whitespace_fragment_yields_nothing() {
        assert!(decomposer().decompose(" \n \n").unwrap().is_empty());
    }
}
