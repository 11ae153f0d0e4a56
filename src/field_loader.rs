//! Field Loader (§4.1): turns config-store field rows into classified,
//! macro- and variable-expanded (name, value) pairs.

use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};

use crate::errors::FieldLoadError;
use crate::macros::{substitute_variables, MacroCache, MacroMode, MacroResolver};
use crate::model::{ClassifiedFields, Field, FieldKind, FieldRow, VariableScope};

/// Percent-encodes everything outside unreserved characters for
/// `query_field`/`post_field` values; space encodes as `%20`, not `+`.
const FORM_ENCODE_SET: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~');

fn form_encode(s: &str) -> String {
    utf8_percent_encode(s, FORM_ENCODE_SET).to_string()
}

/// Loads and classifies one field list (either a test's or a step's),
/// applying the masked/unmasked macro-expansion ordering from §4.1:
///
/// 1. Every value is first macro-expanded in unmasked mode, so percent- or
///    form-encoding downstream operates on real values.
/// 2. Variable fields keep their key literal; variable definitions are
///    never nested-expanded.
/// 3. Non-variable keys get masked macro expansion, then variable
///    substitution; their values additionally get variable substitution.
/// 4. `query_field` / `post_field` pairs are form-encoded on both sides.
pub fn load_fields(
    resolver: &dyn MacroResolver,
    cache: &mut MacroCache,
    hostid: u64,
    scope: &VariableScope,
    rows: &[FieldRow],
) -> Result<ClassifiedFields, FieldLoadError> {
    let mut out = ClassifiedFields::default();

    for row in rows {
        let value = cache
            .resolve(resolver, &row.value, hostid, MacroMode::Unmasked)
            .map_err(FieldLoadError::MacroExpansion)?;

        let field = match row.kind {
            FieldKind::Variable => Field::Variable(row.name.clone(), value),
            FieldKind::Header => {
                let key = cache
                    .resolve(resolver, &row.name, hostid, MacroMode::Masked)
                    .map_err(FieldLoadError::MacroExpansion)?;
                let key = substitute_variables(scope, &key);
                let value = substitute_variables(scope, &value);
                Field::Header(key, value)
            }
            FieldKind::QueryField => {
                let key = cache
                    .resolve(resolver, &row.name, hostid, MacroMode::Masked)
                    .map_err(FieldLoadError::MacroExpansion)?;
                let key = substitute_variables(scope, &key);
                let value = substitute_variables(scope, &value);
                Field::QueryField(form_encode(&key), form_encode(&value))
            }
            FieldKind::PostField => {
                let key = cache
                    .resolve(resolver, &row.name, hostid, MacroMode::Masked)
                    .map_err(FieldLoadError::MacroExpansion)?;
                let key = substitute_variables(scope, &key);
                let value = substitute_variables(scope, &value);
                Field::PostField(form_encode(&key), form_encode(&value))
            }
        };
        out.push(field);
    }

    Ok(out)
}
