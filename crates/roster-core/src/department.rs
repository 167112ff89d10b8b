//! Ordering for homeroom codes stored in the department field.
//!
//! Codes look like `3B` or `10SWA`: a year number followed by a homeroom.
//! Younger years sort their homerooms alphabetically; from year 6 onward
//! homerooms follow [`HOMEROOM_ORDER`].

use std::{cmp::Ordering, collections::BTreeSet};

/// Homeroom order used from [`ORDERED_FROM_YEAR`] onward.
pub const HOMEROOM_ORDER: [&str; 8] = ["L", "E", "A", "R", "N", "S", "JS", "SWA"];

pub const ORDERED_FROM_YEAR: u32 = 6;

/// Split a code into its leading year number and the homeroom remainder.
fn split(code: &str) -> (Option<u32>, &str) {
  let digits = code.bytes().take_while(u8::is_ascii_digit).count();
  (code[..digits].parse().ok(), &code[digits..])
}

/// Tabled homerooms first, in table order; anything else after them,
/// alphabetically.
fn homeroom_rank(homeroom: &str) -> (usize, &str) {
  match HOMEROOM_ORDER.iter().position(|h| *h == homeroom) {
    Some(pos) => (pos, ""),
    None => (HOMEROOM_ORDER.len(), homeroom),
  }
}

/// Total order over department codes.
pub fn compare(a: &str, b: &str) -> Ordering {
  let (year_a, room_a) = split(a);
  let (year_b, room_b) = split(b);

  year_a
    .cmp(&year_b)
    .then_with(|| match year_a {
      Some(year) if year >= ORDERED_FROM_YEAR => {
        homeroom_rank(room_a).cmp(&homeroom_rank(room_b))
      }
      _ => room_a.cmp(room_b),
    })
    .then_with(|| a.cmp(b))
}

/// Department selector options: upper-cased, deduplicated, only codes that
/// start with a year, sorted with [`compare`].
pub fn options<I, S>(raw: I) -> Vec<String>
where
  I: IntoIterator<Item = S>,
  S: AsRef<str>,
{
  let unique: BTreeSet<String> = raw
    .into_iter()
    .map(|d| d.as_ref().trim().to_uppercase())
    .filter(|d| d.starts_with(|c: char| c.is_ascii_digit()))
    .collect();

  let mut sorted: Vec<String> = unique.into_iter().collect();
  sorted.sort_by(|a, b| compare(a, b));
  sorted
}
