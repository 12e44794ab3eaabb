// Non-news detection: site pages and failed scrapes that slipped into the
// catalogue through sitemap imports.

use crate::story::Story;

/// URL path fragments that identify site infrastructure rather than
/// reporting. Checked in order; the first hit is the reported reason.
const NON_NEWS_PATHS: &[(&str, &str)] = &[
    ("/about", "Non-news URL: About page"),
    ("/our-editorial", "Non-news URL: Editorial policy page"),
    ("/jobs", "Non-news URL: Jobs page"),
    ("/corrections", "Non-news URL: Corrections page"),
    ("/commenting-guidelines", "Non-news URL: Guidelines page"),
    ("/funders", "Non-news URL: Funders page"),
    ("/volunteer", "Non-news URL: Volunteer page"),
    ("/staff", "Non-news URL: Staff page"),
    ("/contact", "Non-news URL: Contact page"),
    ("/advertise", "Non-news URL: Advertising page"),
    ("/donate", "Non-news URL: Donation page"),
    ("/newsletter", "Non-news URL: Newsletter page"),
    ("/cart", "Non-news URL: Cart page"),
    ("/thanks", "Non-news URL: Thank you page"),
    ("/thank-you", "Non-news URL: Thank you page"),
    ("/youre-all-set", "Non-news URL: Confirmation page"),
    ("/stay-connected", "Non-news URL: Subscription page"),
    ("/almost-finished", "Non-news URL: Subscription page"),
    ("/so-sorry-to-see-you-go", "Non-news URL: Unsubscribe page"),
    ("/air-sensor-form", "Non-news URL: Form page"),
    ("/404", "Non-news URL: 404 error page"),
    ("/403", "Non-news URL: 403 error page"),
    ("/page-not-found", "Non-news URL: 404 error page"),
    ("/restricted", "Non-news URL: 403 restricted page"),
    ("/explore-more", "Non-news URL: Navigation page"),
    ("/was-it-something-we-said", "Non-news URL: Error page"),
];

pub const EMPTY_TITLE: &str = "Empty or invalid title (scraping failure)";

const PLACEHOLDER_TITLES: &[&str] = &["", "...", "N/A"];

/// Why a story should be removed from the catalogue. Empty means it is news.
pub fn non_news_reasons(story: &Story) -> Vec<&'static str> {
    let mut reasons = Vec::new();

    let url = story.url.to_lowercase();
    if let Some((_, reason)) = NON_NEWS_PATHS.iter().find(|(path, _)| url.contains(path)) {
        reasons.push(*reason);
    }

    if PLACEHOLDER_TITLES.contains(&story.title.trim()) {
        reasons.push(EMPTY_TITLE);
    }

    reasons
}

pub fn is_non_news(story: &Story) -> bool {
    !non_news_reasons(story).is_empty()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn story(url: &str, title: &str) -> Story {
        Story {
            id: 1,
            url: url.into(),
            title: title.into(),
            author: String::new(),
            date: String::new(),
            social_abstract: String::new(),
            umbrella: String::new(),
            geographic_area: String::new(),
            neighborhoods: Default::default(),
        }
    }

    #[test]
    fn news_story_has_no_reasons() {
        let s = story(
            "https://www.publicsource.org/pittsburgh-housing-authority-waitlist/",
            "Housing authority reopens its waitlist",
        );
        assert!(non_news_reasons(&s).is_empty());
        assert!(!is_non_news(&s));
    }

    #[test]
    fn site_pages_are_flagged_once() {
        let s = story("https://www.publicsource.org/about/staff/", "Our staff");
        assert_eq!(non_news_reasons(&s), vec!["Non-news URL: About page"]);

        let s = story("https://www.publicsource.org/DONATE/", "Support local news");
        assert_eq!(non_news_reasons(&s), vec!["Non-news URL: Donation page"]);
    }

    #[test]
    fn placeholder_titles_are_flagged() {
        for title in ["", "  ", "...", "N/A"] {
            let s = story("https://www.publicsource.org/some-story/", title);
            assert_eq!(non_news_reasons(&s), vec![EMPTY_TITLE], "title {title:?}");
        }
    }

    #[test]
    fn url_and_title_reasons_combine() {
        let s = story("https://www.publicsource.org/page-not-found/", "...");
        assert_eq!(
            non_news_reasons(&s),
            vec!["Non-news URL: 404 error page", EMPTY_TITLE]
        );
    }
}
