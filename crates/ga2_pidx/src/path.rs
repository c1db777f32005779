//! Helpers for the forward slash, case-insensitive paths used by containers.

/// Convert backslashes to forward slashes and strip leading separators.
///
/// Blank input normalizes to an empty string.
pub fn normalize_path(path: &str) -> String {
    if path.trim().is_empty() {
        return String::new();
    }
    path.replace('\\', "/").trim_start_matches('/').to_owned()
}

/// Key used to compare names and paths without regard to case.
///
/// Each character is uppercased on its own. Characters whose uppercase form is longer than one
/// character, such as `ß`, are kept as they are. Ordering keys with [`Ord`] sorts names the way
/// the game's own tools do.
pub fn fold_case(name: &str) -> String {
    name.chars()
        .map(|c| {
            let mut upper = c.to_uppercase();
            match (upper.next(), upper.next()) {
                (Some(single), None) => single,
                _ => c,
            }
        })
        .collect()
}

/// Whether two names are equal ignoring case
pub fn eq_ignore_case(a: &str, b: &str) -> bool {
    a == b || fold_case(a) == fold_case(b)
}

#[cfg(test)]
mod test {
    use pretty_assertions::assert_eq;

    use super::{eq_ignore_case, fold_case, normalize_path};

    #[test]
    fn normalize_separators() {
        assert_eq!(normalize_path("\\scn\\ev01.scn"), "scn/ev01.scn");
        assert_eq!(normalize_path("//a/b"), "a/b");
        assert_eq!(normalize_path("a/b/"), "a/b/");
    }

    #[test]
    fn normalize_blank() {
        assert_eq!(normalize_path(""), "");
        assert_eq!(normalize_path("   "), "");
    }

    #[test]
    fn case_folding() {
        assert_eq!(fold_case("Tbl/Item.tbl"), "TBL/ITEM.TBL");
        assert!(eq_ignore_case("ADV.DAT", "adv.dat"));
        assert!(!eq_ignore_case("adv.dat", "adv2.dat"));
    }

    #[test]
    fn case_folding_is_per_character() {
        assert_eq!(fold_case("straße.txt"), "STRAßE.TXT");
        assert_eq!(fold_case("ｓｃｎ/ａ.txt"), "ＳＣＮ/Ａ.TXT");
        assert_eq!(fold_case("ｼﾅﾘｵ.scn"), "ｼﾅﾘｵ.SCN");
        assert!(!eq_ignore_case("STRASSE", "straße"));
        assert!(eq_ignore_case("Straße", "STRAßE"));
    }
}
