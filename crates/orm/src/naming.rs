//! Naming conventions - foreign key, alias, and junction table name synthesis

/// Convert a CamelCase or mixed name to snake_case
pub fn underscore(name: &str) -> String {
    let mut out = String::with_capacity(name.len() + 4);
    for (i, ch) in name.chars().enumerate() {
        if ch.is_uppercase() {
            if i > 0 {
                out.push('_');
            }
            out.extend(ch.to_lowercase());
        } else {
            out.push(ch);
        }
    }
    out
}

/// Convert a snake_case name to CamelCase
pub fn camelize(name: &str) -> String {
    name.split('_')
        .filter(|part| !part.is_empty())
        .map(|part| {
            let mut chars = part.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
                None => String::new(),
            }
        })
        .collect()
}

/// Naive singular form of a table name, good enough for key synthesis
pub fn singularize(name: &str) -> String {
    if let Some(stem) = name.strip_suffix("ies") {
        return format!("{}y", stem);
    }
    if name.ends_with("ss") {
        return name.to_string();
    }
    match name.strip_suffix('s') {
        Some(stem) => stem.to_string(),
        None => name.to_string(),
    }
}

/// Default foreign key column for a table: `<singular>_id`
pub fn default_foreign_key(table_name: &str) -> String {
    format!("{}_id", singularize(&underscore(table_name)))
}

/// Default junction table name: the two table names, alphabetically ordered
pub fn junction_table_name(left: &str, right: &str) -> String {
    let mut tables = [underscore(left), underscore(right)];
    tables.sort();
    tables.join("_")
}

/// Property key a loaded association nests under
pub fn property_name(association_name: &str) -> String {
    underscore(association_name)
}
