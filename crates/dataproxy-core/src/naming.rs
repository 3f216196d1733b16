/// Lower-cases the first character: `LeaderboardRow` becomes `leaderboardRow`.
///
/// The client exposes one delegate per model under this name.
#[must_use]
pub fn lower_first(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_lowercase().chain(chars).collect(),
        None => String::new(),
    }
}
