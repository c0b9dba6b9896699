use std::collections::BTreeMap;
use std::fmt;

/// Everything built over one span, by category. Ordered so that walking a
/// cell is reproducible.
pub type Cell<T> = BTreeMap<String, Vec<T>>;

/// A triangular table of cells, one per `start < end <= num_tokens`.
///
/// Lookups outside the triangle, or of a category nothing was added under,
/// come back empty rather than failing.
#[derive(Debug, Clone)]
pub struct Chart<T> {
  num_tokens: usize,
  /// cells[start][end - start - 1]
  cells: Vec<Vec<Cell<T>>>,
}

impl<T> Chart<T> {
  pub fn new(num_tokens: usize) -> Self {
    let cells = (0..num_tokens)
      .map(|start| (start..num_tokens).map(|_| Cell::new()).collect())
      .collect();
    Self { num_tokens, cells }
  }

  pub fn num_tokens(&self) -> usize {
    self.num_tokens
  }

  fn in_range(&self, start: usize, end: usize) -> bool {
    start < end && end <= self.num_tokens
  }

  pub fn cell(&self, start: usize, end: usize) -> Option<&Cell<T>> {
    if !self.in_range(start, end) {
      return None;
    }
    Some(&self.cells[start][end - start - 1])
  }

  pub fn cell_mut(&mut self, start: usize, end: usize) -> Option<&mut Cell<T>> {
    if !self.in_range(start, end) {
      return None;
    }
    Some(&mut self.cells[start][end - start - 1])
  }

  pub fn get(&self, start: usize, end: usize, cat: &str) -> &[T] {
    self
      .cell(start, end)
      .and_then(|cell| cell.get(cat))
      .map(Vec::as_slice)
      .unwrap_or(&[])
  }

  pub fn contains(&self, start: usize, end: usize, cat: &str) -> bool {
    !self.get(start, end, cat).is_empty()
  }

  /// Categories with something in them over this span
  pub fn categories(&self, start: usize, end: usize) -> impl Iterator<Item = &str> {
    self.cell(start, end).into_iter().flat_map(|cell| cell.keys().map(String::as_str))
  }

  /// Panics if the span is outside the chart.
  pub fn add(&mut self, start: usize, end: usize, cat: &str, item: T) {
    let cell = self.cell_mut(start, end).expect("span outside chart");
    match cell.get_mut(cat) {
      Some(items) => items.push(item),
      None => {
        cell.insert(cat.to_string(), vec![item]);
      }
    }
  }

  /// Removes one slot's items so they can be reworked and put back
  pub fn take(&mut self, start: usize, end: usize, cat: &str) -> Vec<T> {
    self
      .cell_mut(start, end)
      .and_then(|cell| cell.remove(cat))
      .unwrap_or_default()
  }

  /// Replaces one slot. An empty list leaves no slot behind.
  pub fn put(&mut self, start: usize, end: usize, cat: &str, items: Vec<T>) {
    if let Some(cell) = self.cell_mut(start, end) {
      if items.is_empty() {
        cell.remove(cat);
      } else {
        cell.insert(cat.to_string(), items);
      }
    }
  }

  /// Drops every slot for which `keep(start, end, cat)` is false
  pub fn retain(&mut self, mut keep: impl FnMut(usize, usize, &str) -> bool) {
    for (start, row) in self.cells.iter_mut().enumerate() {
      for (offset, cell) in row.iter_mut().enumerate() {
        let end = start + offset + 1;
        cell.retain(|cat, _| keep(start, end, cat));
      }
    }
  }

  /// All spans, by start and then end
  pub fn spans(&self) -> impl Iterator<Item = (usize, usize)> + use<T> {
    let n = self.num_tokens;
    (0..n).flat_map(move |start| (start + 1..=n).map(move |end| (start, end)))
  }

  /// (start, end, category, items) for every filled slot
  pub fn iter(&self) -> impl Iterator<Item = (usize, usize, &str, &[T])> {
    self.cells.iter().enumerate().flat_map(|(start, row)| {
      row.iter().enumerate().flat_map(move |(offset, cell)| {
        cell
          .iter()
          .map(move |(cat, items)| (start, start + offset + 1, cat.as_str(), items.as_slice()))
      })
    })
  }

  /// Number of filled (span, category) slots
  pub fn num_slots(&self) -> usize {
    self.cells.iter().flatten().map(|cell| cell.len()).sum()
  }

  /// Number of items across every slot
  pub fn num_items(&self) -> usize {
    self.iter().map(|(_, _, _, items)| items.len()).sum()
  }
}

impl<T> fmt::Display for Chart<T>
where
  T: fmt::Display,
{
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    for (start, end, cat, items) in self.iter() {
      writeln!(f, "{}..{} {}:", start, end, cat)?;
      for item in items {
        writeln!(f, "  {}", item)?;
      }
    }
    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_absent_lookups_are_empty() {
    let chart: Chart<u32> = Chart::new(3);
    assert!(chart.get(0, 2, "$A").is_empty());
    assert!(chart.get(2, 2, "$A").is_empty());
    assert!(chart.get(2, 1, "$A").is_empty());
    assert!(chart.get(0, 4, "$A").is_empty());
    assert!(chart.cell(1, 5).is_none());
    assert_eq!(chart.categories(0, 9).count(), 0);

    let empty: Chart<u32> = Chart::new(0);
    assert!(empty.get(0, 0, "$ROOT").is_empty());
    assert_eq!(empty.spans().count(), 0);
  }

  #[test]
  fn test_add_take_put() {
    let mut chart = Chart::new(2);
    chart.add(0, 2, "$B", 1);
    chart.add(0, 2, "$A", 2);
    chart.add(0, 2, "$A", 3);
    assert_eq!(chart.get(0, 2, "$A"), &[2, 3]);
    assert_eq!(chart.categories(0, 2).collect::<Vec<_>>(), vec!["$A", "$B"]);

    let taken = chart.take(0, 2, "$A");
    assert!(!chart.contains(0, 2, "$A"));
    chart.put(0, 2, "$A", taken.into_iter().rev().collect());
    assert_eq!(chart.get(0, 2, "$A"), &[3, 2]);

    chart.put(0, 2, "$B", vec![]);
    assert_eq!(chart.num_slots(), 1);
    assert_eq!(chart.num_items(), 2);
  }

  #[test]
  fn test_spans_and_retain() {
    let mut chart = Chart::new(3);
    assert_eq!(
      chart.spans().collect::<Vec<_>>(),
      vec![(0, 1), (0, 2), (0, 3), (1, 2), (1, 3), (2, 3)]
    );

    chart.add(0, 1, "$A", 'a');
    chart.add(1, 3, "$A", 'b');
    chart.add(1, 3, "$B", 'c');
    chart.retain(|start, _, cat| start == 1 && cat == "$A");
    assert_eq!(chart.num_slots(), 1);
    assert_eq!(chart.to_string(), "1..3 $A:\n  b\n");
  }
}
