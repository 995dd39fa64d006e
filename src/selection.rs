//! Choosing which variables get their own output files

use crate::dataset::Dataset;
use log::debug;
use std::collections::BTreeSet;

/// The variables chosen for export.
///
/// Iterating consumes the selection; call [`select_variables`] again to start
/// over.
#[derive(Debug)]
pub struct VariableSelection {
    names: std::collections::btree_set::IntoIter<String>,
}

impl Iterator for VariableSelection {
    type Item = String;

    fn next(&mut self) -> Option<String> {
        self.names.next()
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.names.size_hint()
    }
}

impl ExactSizeIterator for VariableSelection {}

/// Pick the data variables to export.
///
/// Without a request every data variable is a candidate, otherwise only the
/// requested names that are data variables. Skipped names (in their given,
/// upper and lower case spellings) and variables that only exist to support
/// others are then removed.
pub fn select_variables<S: AsRef<str>>(
    dataset: &Dataset,
    requested: Option<&[S]>,
    skip: &[S],
    dependency_only: &BTreeSet<String>,
) -> VariableSelection {
    let data_vars: BTreeSet<&str> = dataset.data_var_names().collect();

    let mut chosen: BTreeSet<String> = match requested {
        Some(names) => names
            .iter()
            .map(AsRef::as_ref)
            .filter(|name| {
                let known = data_vars.contains(name);
                if !known {
                    debug!("Requested variable '{name}' is not a data variable, ignoring");
                }
                known
            })
            .map(str::to_string)
            .collect(),
        None => data_vars.iter().map(|name| name.to_string()).collect(),
    };

    for name in skip.iter().map(AsRef::as_ref) {
        chosen.remove(name);
        chosen.remove(&name.to_uppercase());
        chosen.remove(&name.to_lowercase());
    }
    chosen.retain(|name| !dependency_only.contains(name));

    VariableSelection {
        names: chosen.into_iter(),
    }
}
