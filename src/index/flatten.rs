//! Symbol tree flattening

use lsp_types::DocumentSymbol;

/// Depth-first pre-order walk yielding each symbol with its container path
///
/// The path holds the names of the enclosing symbols, outermost first, e.g.
/// `["Outer", "Inner"]` for a method of `Outer::Inner`.
pub struct SymbolTreeIter<'a> {
    stack: Vec<(&'a DocumentSymbol, Vec<&'a str>)>,
}

impl<'a> SymbolTreeIter<'a> {
    pub fn new(roots: &'a [DocumentSymbol]) -> Self {
        let stack = roots.iter().rev().map(|symbol| (symbol, Vec::new())).collect();
        Self { stack }
    }
}

impl<'a> Iterator for SymbolTreeIter<'a> {
    type Item = (&'a DocumentSymbol, Vec<&'a str>);

    fn next(&mut self) -> Option<Self::Item> {
        let (symbol, path) = self.stack.pop()?;

        if let Some(children) = symbol.children.as_deref().filter(|c| !c.is_empty()) {
            let mut child_path = path.clone();
            child_path.push(&symbol.name);
            // Reversed so the first child is popped next
            for child in children.iter().rev() {
                self.stack.push((child, child_path.clone()));
            }
        }

        Some((symbol, path))
    }
}

/// Every symbol in the tree, parents before children, siblings in source order
pub fn flatten(roots: &[DocumentSymbol]) -> Vec<DocumentSymbol> {
    SymbolTreeIter::new(roots)
        .map(|(symbol, _)| symbol.clone())
        .collect()
}

pub fn count_symbols(roots: &[DocumentSymbol]) -> usize {
    SymbolTreeIter::new(roots).count()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::symbols::symbol_with_children as node;

    fn names(symbols: &[DocumentSymbol]) -> Vec<&str> {
        symbols.iter().map(|s| s.name.as_str()).collect()
    }

    #[test]
    fn test_flatten_is_depth_first_pre_order() {
        // A{B{D}, C}, E
        let roots = vec![
            node("A", vec![node("B", vec![node("D", vec![])]), node("C", vec![])]),
            node("E", vec![]),
        ];

        assert_eq!(names(&flatten(&roots)), ["A", "B", "D", "C", "E"]);
        assert_eq!(count_symbols(&roots), 5);
    }

    #[test]
    fn test_flatten_empty() {
        assert!(flatten(&[]).is_empty());
        assert_eq!(count_symbols(&[]), 0);
    }

    #[test]
    fn test_leaf_with_absent_or_empty_children() {
        let mut absent = node("leaf", vec![]);
        absent.children = None;
        let empty = node("empty", vec![]);

        assert_eq!(names(&flatten(&[absent, empty])), ["leaf", "empty"]);
    }

    #[test]
    fn test_duplicates_are_kept() {
        let roots = vec![node("same", vec![]), node("same", vec![])];
        assert_eq!(flatten(&roots).len(), 2);
    }

    #[test]
    fn test_iterator_reports_container_path() {
        let roots = vec![node(
            "Outer",
            vec![node("Inner", vec![node("method", vec![])])],
        )];

        let paths: Vec<(String, Vec<&str>)> = SymbolTreeIter::new(&roots)
            .map(|(symbol, path)| (symbol.name.clone(), path))
            .collect();

        assert_eq!(
            paths,
            vec![
                ("Outer".to_string(), vec![]),
                ("Inner".to_string(), vec!["Outer"]),
                ("method".to_string(), vec!["Outer", "Inner"]),
            ]
        );
    }

    #[test]
    fn test_flattened_parent_keeps_children() {
        let roots = vec![node("A", vec![node("B", vec![])])];
        let flat = flatten(&roots);
        assert_eq!(flat[0].children.as_ref().map(Vec::len), Some(1));
    }
}
