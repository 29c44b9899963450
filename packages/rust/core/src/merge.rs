//! Deduplicating merge of contributed references.

use indexmap::IndexSet;

use htmlcombine_shared::Assets;

/// Union of `partials` in input order, keeping the first occurrence of each
/// reference. References are compared by exact string equality.
pub fn merge<'a, I>(partials: I) -> Assets
where
    I: IntoIterator<Item = &'a Assets>,
{
    let mut seen: IndexSet<&str> = IndexSet::new();
    for partial in partials {
        seen.extend(partial.js.iter().map(String::as_str));
    }

    Assets {
        js: seen.into_iter().map(str::to_string).collect(),
    }
}
