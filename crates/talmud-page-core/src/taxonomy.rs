//! Commentary classification rules.
//!
//! A [`Taxonomy`] is an ordered list of [`CommentaryKind`]s. A fragment whose
//! display name is exactly a kind's name belongs to that kind; otherwise it
//! belongs to the first kind with a rule that accepts it, so the order of the
//! list is part of its meaning. Tests and alternative deployments build their own
//! list with [`Taxonomy::new`]; the aggregator receives it at construction.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::source::Fragment;

/// An additional way (besides an exact display-name match) for a kind to
/// claim a fragment.
#[derive(Debug, Clone)]
pub enum Rule {
    /// The fragment's `category` equals this value.
    Category(String),
    /// The fragment's `type` equals this value.
    Type(String),
    /// The pattern is found somewhere in the fragment's display name.
    NamePattern(Regex),
}

impl Rule {
    fn accepts(&self, fragment: &Fragment) -> bool {
        match self {
            Rule::Category(category) => fragment.category.as_deref() == Some(category.as_str()),
            Rule::Type(kind_type) => fragment.kind_type.as_deref() == Some(kind_type.as_str()),
            Rule::NamePattern(pattern) => pattern.is_match(fragment.name()),
        }
    }
}

/// A named category of commentary.
#[derive(Debug, Clone)]
pub struct CommentaryKind {
    pub english_name: String,
    pub hebrew_name: String,
    pub rules: Vec<Rule>,
}

impl CommentaryKind {
    pub fn new(english_name: &str, hebrew_name: &str) -> Self {
        Self {
            english_name: english_name.to_string(),
            hebrew_name: hebrew_name.to_string(),
            rules: Vec::new(),
        }
    }

    pub fn category(mut self, category: &str) -> Self {
        self.rules.push(Rule::Category(category.to_string()));
        self
    }

    pub fn kind_type(mut self, kind_type: &str) -> Self {
        self.rules.push(Rule::Type(kind_type.to_string()));
        self
    }

    /// Adds a display-name pattern. Panics on an invalid pattern, which is a
    /// programming error in a static table.
    pub fn name_pattern(mut self, pattern: &str) -> Self {
        let regex = Regex::new(pattern).unwrap_or_else(|e| panic!("bad pattern {pattern}: {e}"));
        self.rules.push(Rule::NamePattern(regex));
        self
    }

    pub fn is_named(&self, fragment: &Fragment) -> bool {
        fragment.name() == self.english_name
    }

    pub fn accepts(&self, fragment: &Fragment) -> bool {
        self.is_named(fragment) || self.rules.iter().any(|r| r.accepts(fragment))
    }
}

#[derive(Debug, Clone)]
pub struct Taxonomy {
    kinds: Vec<CommentaryKind>,
}

static STANDARD: Lazy<Taxonomy> = Lazy::new(|| {
    Taxonomy::new(vec![
        CommentaryKind::new("Translation", "Translation"),
        CommentaryKind::new("Explanation", "הכנות"),
        CommentaryKind::new("Footnotes", "הערות"),
        CommentaryKind::new("Verses", "תנ\"ך").category("Tanakh"),
        CommentaryKind::new("Mishnah", "משנה").category("Mishnah"),
        CommentaryKind::new("Tosefta", "תוספתא").name_pattern("^Tosefta .*"),
        CommentaryKind::new("Rashi", "רש\"י"),
        CommentaryKind::new("Otzar Laazei Rashi", "אוצר לעזי רש\"י"),
        CommentaryKind::new("Tosafot", "תוספות"),
        CommentaryKind::new("Korban HaEdah", "קרבן העדה"),
        CommentaryKind::new("Penei Moshe", "פני משה"),
        CommentaryKind::new("Rabbeinu Chananel", "ר\"ח").name_pattern("^Rabbeinu Chananel on .*"),
        CommentaryKind::new("Ramban", "רמב\"ן"),
        CommentaryKind::new("Rashba", "רשב\"א"),
        CommentaryKind::new("Rashbam", "רשב\"ם"),
        CommentaryKind::new("Maharsha", "מהרש\"א").name_pattern("(Chidushei Halachot|Chidushei Agadot)"),
        CommentaryKind::new("Maharshal", "מהרש\"ל").name_pattern("(Chokhmat Shlomo on .*|Chokhmat Shlomo)"),
        CommentaryKind::new("Meir Lublin", "מהר\"ם לובלין").name_pattern("^Maharam$"),
        CommentaryKind::new("Rosh", "רא\"ש").name_pattern("^Rosh on "),
        CommentaryKind::new("Ritva", "ריטב\"א"),
        CommentaryKind::new("Rav Nissim Gaon", "רבנו נסים").name_pattern("^Rav Nissim Gaon on "),
        CommentaryKind::new("Gilyon HaShas", "גליון הש\"ס"),
        CommentaryKind::new("Shulchan Arukh", "שולחן ערוך").name_pattern("^Shulchan Arukh, "),
        CommentaryKind::new("Mishnah Berurah", "משנה ברורה"),
        CommentaryKind::new("Mishneh Torah", "משנה תורה").name_pattern("^Mishneh Torah, "),
        CommentaryKind::new("Mesorat Hashas", "מסורת הש\"ס").kind_type("mesorat hashas"),
        CommentaryKind::new("Jastrow", "Jastrow"),
        CommentaryKind::new("Abarbanel", "אברבנאל").name_pattern("^Abarbanel on"),
        CommentaryKind::new("Guide for the Perplexed", "מורה נבוכים"),
        CommentaryKind::new("Haamek Davar", "העמק דבר").name_pattern("^Haamek Davar on"),
        CommentaryKind::new("Ibn Ezra", "אבן עזרא").name_pattern("^Ibn Ezra on "),
        CommentaryKind::new("JPS 1985 Footnotes", "JPS Footnotes"),
        CommentaryKind::new("Kedushat Levi", "קדושת לוי").name_pattern("^Kedushat Levi, "),
        CommentaryKind::new("Kli Yakar", "כלי יקר").name_pattern("^Kli Yakar on "),
        CommentaryKind::new("Malbim", "מלבי\"ם").name_pattern("^Malbim on "),
        CommentaryKind::new("Mei HaShiloach", "מי השלוח"),
        CommentaryKind::new("Meshech Hochma", "משך חכמה"),
        CommentaryKind::new("Radak", "רד\"ק").name_pattern("^Radak on "),
        CommentaryKind::new("Sefer HaChinukh", "ספר החינוך"),
        CommentaryKind::new("Sforno", "ספורנו").name_pattern("^Sforno on "),
        CommentaryKind::new("Torah Temima", "תורה תמימה").name_pattern("^Torah Temimah on "),
        CommentaryKind::new("Steinsaltz Masechet Intro", "הקדמה למסכת"),
        CommentaryKind::new("Steinsaltz Perek Intro", "הקדמה לפרק"),
        CommentaryKind::new("Steinsaltz Perek Summary", "סיכום לפרק"),
        CommentaryKind::new("Steinsaltz", "שטיינזלץ"),
    ])
});

impl Taxonomy {
    pub fn new(kinds: Vec<CommentaryKind>) -> Self {
        Self { kinds }
    }

    /// The site's standard commentary list.
    pub fn standard() -> Self {
        STANDARD.clone()
    }

    pub fn kinds(&self) -> &[CommentaryKind] {
        &self.kinds
    }

    /// The kind whose name is exactly the fragment's display name, otherwise
    /// the first kind with a rule that accepts it.
    pub fn classify(&self, fragment: &Fragment) -> Option<&CommentaryKind> {
        self.kinds
            .iter()
            .find(|kind| kind.is_named(fragment))
            .or_else(|| self.kinds.iter().find(|kind| kind.accepts(fragment)))
    }

    pub fn get(&self, english_name: &str) -> Option<&CommentaryKind> {
        self.kinds.iter().find(|kind| kind.english_name == english_name)
    }
}

impl Default for Taxonomy {
    fn default() -> Self {
        Self::standard()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::CollectiveTitle;
    use proptest::prelude::*;

    fn fragment(name: &str) -> Fragment {
        Fragment {
            collective_title: CollectiveTitle { en: name.into() },
            ..Fragment::default()
        }
    }

    fn classify(fragment: &Fragment) -> Option<String> {
        Taxonomy::standard()
            .classify(fragment)
            .map(|k| k.english_name.clone())
    }

    #[test]
    fn test_exact_name() {
        assert_eq!(classify(&fragment("Rashi")).as_deref(), Some("Rashi"));
        assert_eq!(classify(&fragment("Steinsaltz")).as_deref(), Some("Steinsaltz"));
    }

    #[test]
    fn test_steinsaltz_introductions() {
        for name in [
            "Steinsaltz Masechet Intro",
            "Steinsaltz Perek Intro",
            "Steinsaltz Perek Summary",
        ] {
            assert_eq!(classify(&fragment(name)).as_deref(), Some(name));
        }
        let taxonomy = Taxonomy::standard();
        let summary = taxonomy.get("Steinsaltz Perek Summary").unwrap();
        assert_eq!(summary.hebrew_name, "סיכום לפרק");
    }

    #[test]
    fn test_category_and_type() {
        let mut verse = fragment("Genesis");
        verse.category = Some("Tanakh".into());
        assert_eq!(classify(&verse).as_deref(), Some("Verses"));

        let mut mesorat = fragment("Shabbat");
        mesorat.kind_type = Some("mesorat hashas".into());
        assert_eq!(classify(&mesorat).as_deref(), Some("Mesorat Hashas"));
    }

    #[test]
    fn test_name_patterns() {
        assert_eq!(
            classify(&fragment("Chidushei Agadot")).as_deref(),
            Some("Maharsha")
        );
        assert_eq!(classify(&fragment("Maharam")).as_deref(), Some("Meir Lublin"));
        assert_eq!(classify(&fragment("Maharam Shif")), None);
        assert_eq!(
            classify(&fragment("Shulchan Arukh, Orach Chayim")).as_deref(),
            Some("Shulchan Arukh")
        );
    }

    #[test]
    fn test_order_breaks_ties() {
        // Mesorat Hashas would accept it by type, but Verses comes first.
        let mut both = fragment("Unknown");
        both.category = Some("Tanakh".into());
        both.kind_type = Some("mesorat hashas".into());
        assert_eq!(classify(&both).as_deref(), Some("Verses"));
    }

    #[test]
    fn test_exact_name_beats_earlier_rules() {
        let mut steinsaltz = fragment("Steinsaltz");
        steinsaltz.category = Some("Tanakh".into());
        assert_eq!(classify(&steinsaltz).as_deref(), Some("Steinsaltz"));
    }

    #[test]
    fn test_unclassifiable() {
        assert_eq!(classify(&fragment("Some Unknown Commentary")), None);
    }

    #[test]
    fn test_custom_taxonomy() {
        let taxonomy = Taxonomy::new(vec![CommentaryKind::new("Everything", "הכל").name_pattern(".")]);
        assert_eq!(
            taxonomy.classify(&fragment("Rashi")).map(|k| k.english_name.as_str()),
            Some("Everything")
        );
    }

    proptest! {
        #[test]
        fn prop_exact_name_always_wins(
            index in 0usize..42,
            category in proptest::option::of("Tanakh|Mishnah|[A-Za-z]{1,8}"),
            kind_type in proptest::option::of("mesorat hashas|[a-z ]{1,12}"),
        ) {
            let taxonomy = Taxonomy::standard();
            let kind = &taxonomy.kinds()[index % taxonomy.kinds().len()];
            let mut f = fragment(&kind.english_name);
            f.category = category;
            f.kind_type = kind_type;
            let classified = taxonomy.classify(&f).map(|k| k.english_name.clone());
            prop_assert_eq!(classified, Some(kind.english_name.clone()));
        }
    }
}
