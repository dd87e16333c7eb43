use crate::table::Cell;

/// Assign a category to an extension cell.
///
/// Returns the first category, in list order, whose keyword occurs anywhere in
/// the extension text, compared case-insensitively. Non-text cells and texts
/// matching nothing give `""`.
pub fn classify(extension: &Cell, categories: &[String]) -> String {
    match extension.as_text() {
        Some(text) => classify_text(text, categories),
        None => String::new(),
    }
}

pub fn classify_text(text: &str, categories: &[String]) -> String {
    let haystack = text.to_lowercase();
    categories
        .iter()
        .filter(|keyword| !keyword.is_empty())
        .find(|keyword| haystack.contains(&keyword.to_lowercase()))
        .cloned()
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cats(names: &[&str]) -> Vec<String> {
        names.iter().map(|n| n.to_string()).collect()
    }

    #[test]
    fn matches_case_insensitively_anywhere() {
        let categories = cats(&["Latino", "Agape"]);
        assert_eq!(classify(&Cell::text("Ext 204 - LATINO line"), &categories), "Latino");
        assert_eq!(classify(&Cell::text("agape-queue"), &categories), "Agape");
    }

    #[test]
    fn earliest_listed_keyword_wins() {
        let text = Cell::text("Agape Latino overflow");
        assert_eq!(classify(&text, &cats(&["Latino", "Agape"])), "Latino");
        assert_eq!(classify(&text, &cats(&["Agape", "Latino"])), "Agape");
    }

    #[test]
    fn non_text_and_unmatched_give_empty() {
        let categories = cats(&["Latino"]);
        assert_eq!(classify(&Cell::Int(204), &categories), "");
        assert_eq!(classify(&Cell::Empty, &categories), "");
        assert_eq!(classify(&Cell::text("Bayview"), &categories), "");
    }

    #[test]
    fn empty_keywords_never_match() {
        assert_eq!(classify_text("anything", &cats(&["", "thing"])), "thing");
        assert_eq!(classify_text("anything", &[]), "");
    }
}
