use super::error::FilterError;
use super::pagination;
use super::params::{ParamValue, QueryParams};
use super::types::{AttributePath, FilterRequest, Predicate};
use crate::resource::descriptor::ResourceDescriptor;

pub struct FilterCompiler;

impl FilterCompiler {
    /// Compile normalized parameters against a resource's declared attributes.
    ///
    /// Enum-coded attributes are resolved to their integer codes in place first. Each
    /// declared attribute with a non-empty value then becomes a partial-match or equality
    /// predicate; everything else in the map is ignored. Sort is always the resource's
    /// default order.
    pub fn compile(params: QueryParams, descriptor: &ResourceDescriptor) -> Result<FilterRequest, FilterError> {
        let params = Self::resolve_enum_tokens(params, descriptor)?;
        let page = pagination::resolve(&params, descriptor.default_page_size(), descriptor.max_page_size());

        let mut predicates = Vec::new();
        for (key, value) in params.iter() {
            let Some(path) = AttributePath::parse(key) else {
                continue;
            };
            // The owner predicate comes from the caller identity alone
            if path.relation.is_none() && path.column == descriptor.owner_field() {
                tracing::warn!("Ignoring client filter on owner column '{}' of '{}'", key, descriptor.name());
                continue;
            }
            let Some(kind) = descriptor.attribute_kind(&path) else {
                if path.relation.is_some() {
                    tracing::debug!("Ignoring filter '{}' outside the declared relations", key);
                }
                continue;
            };

            let values = value.present_values();
            if values.is_empty() {
                continue;
            }

            if descriptor.is_partial_match(&path) {
                predicates.extend(values.into_iter().map(|v| Predicate::contains(path.clone(), v)));
            } else {
                let coerced = values
                    .into_iter()
                    .map(|raw| {
                        kind.coerce(raw).ok_or_else(|| FilterError::InvalidValue {
                            attribute: key.clone(),
                            value: raw.to_string(),
                            expected: kind,
                        })
                    })
                    .collect::<Result<Vec<_>, _>>()?;
                predicates.push(Predicate::equality(path, kind, coerced));
            }
        }

        Ok(FilterRequest {
            params,
            predicates,
            sort: descriptor.default_sort().to_vec(),
            page,
        })
    }

    fn resolve_enum_tokens(mut params: QueryParams, descriptor: &ResourceDescriptor) -> Result<QueryParams, FilterError> {
        for (path, table) in descriptor.string_to_int() {
            let key = path.to_string();
            let Some(value) = params.get(&key) else {
                continue;
            };
            if value.is_blank() {
                continue;
            }

            let single = matches!(value, ParamValue::Single(_));
            let codes = value
                .present_values()
                .into_iter()
                .map(|token| {
                    table
                        .resolve(token)
                        .map(|code| code.to_string())
                        .ok_or_else(|| FilterError::InvalidEnumToken {
                            attribute: key.clone(),
                            token: token.to_string(),
                            allowed: table.tokens().join(", "),
                        })
                })
                .collect::<Result<Vec<_>, _>>()?;

            let resolved = match (single, codes.as_slice()) {
                (true, [code]) => ParamValue::Single(code.clone()),
                _ => ParamValue::Many(codes),
            };
            params.insert(key, resolved);
        }
        Ok(params)
    }
}
