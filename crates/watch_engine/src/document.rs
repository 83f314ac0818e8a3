use scraper::{Html, Selector};

/// Text of every `<p>` element, in document order.
pub fn html_paragraphs(html: &str) -> Vec<String> {
    let document = Html::parse_document(html);
    let Ok(paragraph) = Selector::parse("p") else {
        return Vec::new();
    };
    document
        .select(&paragraph)
        .map(|p| p.text().collect::<String>())
        .collect()
}
