use crate::classifier::FieldMapping;
use crate::input::FieldInput;
use crate::utils::LineItems;
use log::debug;

/// A statement input assembled from raw line items and their field mapping.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AssembledInput {
    pub input: FieldInput,
    /// Items without a known field.
    pub unmapped: Vec<String>,
    /// Mapped items whose amount was missing in the source.
    pub missing_amounts: Vec<String>,
}

/// Turns raw amounts into a `FieldInput` using a resolved unknown-to-known
/// mapping. Items mapped onto the same field are summed; mapping targets are
/// qualified paths such as `cogs.labor_cost`.
pub fn assemble_input(items: &LineItems, mapping: &FieldMapping) -> AssembledInput {
    let mut assembled = AssembledInput::default();

    for (name, amount) in items {
        let target = match mapping.get(name).cloned().flatten() {
            Some(target) => target,
            None => {
                assembled.unmapped.push(name.clone());
                continue;
            }
        };

        match amount {
            Some(amount) => {
                debug!("'{}' -> {} ({})", name, target, amount);
                assembled.input.add_to_path(&target, *amount);
            }
            None => assembled.missing_amounts.push(name.clone()),
        }
    }

    assembled
}
