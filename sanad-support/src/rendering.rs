//! Rendering of contracts and resolution paths for error messages.
//!
//! A contract is shown as its path-free type name followed by the
//! registration name in brackets: `Arc<dyn Logger>[audit]`. Resolution
//! paths join those labels with arrows.

const PATH_SEPARATOR: &str = "::";
const ARROW: &str = " → ";

/// Characters that end one path inside a type name.
fn is_delimiter(ch: char) -> bool {
    matches!(ch, '<' | '>' | ',' | ' ' | '(' | ')' | '[' | ']' | ';' | '&' | '*')
}

fn last_segment(path: &str) -> &str {
    path.rsplit(PATH_SEPARATOR).next().unwrap_or(path)
}

/// Drops module paths from every type inside `full`.
///
/// ```
/// use sanad_support::rendering::short_type_name;
///
/// assert_eq!(short_type_name("my_app::services::UserService"), "UserService");
/// assert_eq!(short_type_name("alloc::sync::Arc<dyn my_app::Logger>"), "Arc<dyn Logger>");
/// assert_eq!(short_type_name("(u8, alloc::string::String)"), "(u8, String)");
/// ```
pub fn short_type_name(full: &str) -> String {
    let mut short = String::with_capacity(full.len());
    let mut rest = full;
    while let Some(at) = rest.find(is_delimiter) {
        let (path, tail) = rest.split_at(at);
        short.push_str(last_segment(path));
        let mut tail = tail.chars();
        if let Some(delimiter) = tail.next() {
            short.push(delimiter);
        }
        rest = tail.as_str();
    }
    short.push_str(last_segment(rest));
    short
}

/// Label for a contract: short type name plus `[name]` when named.
///
/// ```
/// use sanad_support::rendering::contract_label;
///
/// assert_eq!(contract_label("alloc::string::String", Some("url")), "String[url]");
/// assert_eq!(contract_label("app::Database", None), "Database");
/// ```
pub fn contract_label(type_name: &str, name: Option<&str>) -> String {
    let short = short_type_name(type_name);
    match name {
        Some(name) => format!("{short}[{name}]"),
        None => short,
    }
}

/// Joins contract labels in resolution order: `Page → Cart → Session`.
pub fn render_path<I>(labels: I) -> String
where
    I: IntoIterator,
    I::Item: AsRef<str>,
{
    let mut rendered = String::new();
    for (index, label) in labels.into_iter().enumerate() {
        if index > 0 {
            rendered.push_str(ARROW);
        }
        rendered.push_str(label.as_ref());
    }
    rendered
}

/// Type part of a label, without the registration name.
fn base_type(label: &str) -> &str {
    match label
        .strip_suffix(']')
        .and_then(|rest| rest.rfind('['))
        .filter(|open| *open > 0)
    {
        Some(open) => &label[..open],
        None => label,
    }
}

fn edit_distance(a: &str, b: &str) -> usize {
    let b: Vec<char> = b.chars().collect();
    let mut previous: Vec<usize> = (0..=b.len()).collect();
    let mut current = vec![0; b.len() + 1];

    for (i, left) in a.chars().enumerate() {
        current[0] = i + 1;
        for (j, right) in b.iter().enumerate() {
            let substitution = previous[j] + usize::from(left != *right);
            current[j + 1] = substitution.min(previous[j + 1] + 1).min(current[j] + 1);
        }
        std::mem::swap(&mut previous, &mut current);
    }
    previous[b.len()]
}

/// Registered contract labels that look like `requested`, closest first.
///
/// The same type under another name always qualifies. Other labels
/// qualify when their type is within a small edit distance of the
/// requested one, ignoring case.
///
/// ```
/// use sanad_support::rendering::suggest_contracts;
///
/// let registered = ["Database[primary]", "UserRepository", "Mailer"];
/// assert_eq!(suggest_contracts("Database", &registered, 3), ["Database[primary]"]);
/// assert_eq!(suggest_contracts("UserRepsitory", &registered, 3), ["UserRepository"]);
/// ```
pub fn suggest_contracts(requested: &str, registered: &[&str], limit: usize) -> Vec<String> {
    let wanted = base_type(requested).to_lowercase();
    let tolerance = (wanted.chars().count() / 3).max(2);

    let mut ranked: Vec<(usize, &str)> = registered
        .iter()
        .filter(|label| **label != requested)
        .filter_map(|label| {
            let candidate = base_type(label).to_lowercase();
            let distance = edit_distance(&wanted, &candidate);
            (distance <= tolerance).then_some((distance, *label))
        })
        .collect();

    ranked.sort_unstable();
    ranked
        .into_iter()
        .take(limit)
        .map(|(_, label)| label.to_owned())
        .collect()
}
