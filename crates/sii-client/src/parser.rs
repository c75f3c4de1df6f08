use scraper::{ElementRef, Html, Selector};
use sii_core::types::current_year;
use sii_core::Activity;

/// Marker the upstream prints when the captcha was not accepted.
pub const CAPTCHA_REJECTED_MARKER: &str = "Por favor reingrese Captcha";

/// Name the upstream prints when it has no record.
const NOT_FOUND_PLACEHOLDER: &str = "**";

const NAME_SELECTOR: &str = "html body div div:nth-child(4)";
const ACTIVITY_ROW_SELECTOR: &str = "html body div table tr";
const ACTIVITY_CODE_SELECTOR: &str = "td:nth-child(2) font";
const ACTIVITY_NAME_SELECTOR: &str = "td:nth-child(1) font";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedRecord {
    pub name: String,
    pub activities: Vec<Activity>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParsedResponse {
    Found(ParsedRecord),
    NotFound,
    CaptchaRejected,
    Malformed(String),
}

#[derive(Debug, Clone, Default)]
pub struct ResponseParser {
    current_year: Option<i32>,
}

impl ResponseParser {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pin the year used to recognise year-header rows.
    pub fn with_current_year(mut self, year: i32) -> Self {
        self.current_year = Some(year);
        self
    }

    pub fn parse(&self, body: &str) -> ParsedResponse {
        // Takes precedence over everything else in the body.
        if body.contains(CAPTCHA_REJECTED_MARKER) {
            return ParsedResponse::CaptchaRejected;
        }

        if body.trim().is_empty() {
            return ParsedResponse::Malformed("empty response body".to_string());
        }

        let selectors = match Selectors::compile() {
            Ok(selectors) => selectors,
            Err(reason) => return ParsedResponse::Malformed(reason),
        };

        let document = Html::parse_document(body);

        let name = text_of(document.select(&selectors.name));
        let name = name.trim();
        if name.is_empty() || name == NOT_FOUND_PLACEHOLDER {
            return ParsedResponse::NotFound;
        }

        let year = self.current_year.unwrap_or_else(current_year);
        let activities = document
            .select(&selectors.row)
            .skip(1) // header row
            .filter_map(|row| {
                let code = text_of(row.select(&selectors.code)).trim().to_string();
                if code.parse::<i64>().is_err() || Activity::is_year_header(&code, year) {
                    return None;
                }
                let description = text_of(row.select(&selectors.activity_name));
                Some(Activity::new(code).with_name(description.trim()))
            })
            .collect();

        ParsedResponse::Found(ParsedRecord {
            name: name.to_string(),
            activities,
        })
    }
}

struct Selectors {
    name: Selector,
    row: Selector,
    code: Selector,
    activity_name: Selector,
}

impl Selectors {
    fn compile() -> Result<Self, String> {
        Ok(Self {
            name: selector(NAME_SELECTOR)?,
            row: selector(ACTIVITY_ROW_SELECTOR)?,
            code: selector(ACTIVITY_CODE_SELECTOR)?,
            activity_name: selector(ACTIVITY_NAME_SELECTOR)?,
        })
    }
}

fn selector(css: &str) -> Result<Selector, String> {
    Selector::parse(css).map_err(|e| format!("invalid selector '{css}': {e}"))
}

/// Concatenated text of every matched element.
fn text_of<'a>(elements: impl Iterator<Item = ElementRef<'a>>) -> String {
    elements.flat_map(|el| el.text()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn page(name: &str, rows: &[(&str, &str)]) -> String {
        let mut table = String::from(
            "<tr><td><font>Actividades</font></td><td><font>C&oacute;digo</font></td></tr>",
        );
        for (description, code) in rows {
            table.push_str(&format!(
                "<tr><td><font>{description}</font></td><td><font>{code}</font></td></tr>"
            ));
        }
        format!(
            r#"<html><body><div>
                <div>Servicio de Impuestos Internos</div>
                <div>Consulta Situaci&oacute;n Tributaria de Terceros</div>
                <div>Nombre o Raz&oacute;n Social:</div>
                <div>  {name}  </div>
                <table>{table}</table>
            </div></body></html>"#
        )
    }

    #[test]
    fn test_parse_record_with_activities() {
        let html = page(
            "MIGUEL JUAN SEBASTIAN PINERA ECHENIQUE",
            &[
                ("OTRAS ACTIVIDADES DE SERVICIOS", "829900"),
                ("Documentos timbrados", "2019"),
                ("sin codigo", "n/a"),
                ("ALQUILER DE BIENES", "681011"),
            ],
        );

        let parsed = ResponseParser::new().with_current_year(2024).parse(&html);
        let ParsedResponse::Found(record) = parsed else {
            panic!("expected a record, got {parsed:?}");
        };

        assert_eq!(record.name, "MIGUEL JUAN SEBASTIAN PINERA ECHENIQUE");
        assert_eq!(
            record.activities,
            vec![
                Activity::new("829900").with_name("OTRAS ACTIVIDADES DE SERVICIOS"),
                Activity::new("681011").with_name("ALQUILER DE BIENES"),
            ]
        );
    }

    #[test]
    fn test_year_rows_depend_on_current_year() {
        let html = page("ACME SPA", &[("", "1999"), ("", "2030")]);

        let ParsedResponse::Found(record) = ResponseParser::new().with_current_year(2024).parse(&html) else {
            panic!("expected a record");
        };
        // 1999 is a header row; 2030 is still in the future, so it is a code.
        assert_eq!(record.activities, vec![Activity::new("2030")]);
    }

    #[test]
    fn test_placeholder_name_is_not_found() {
        let parser = ResponseParser::new();
        assert_eq!(parser.parse(&page("**", &[])), ParsedResponse::NotFound);
        assert_eq!(parser.parse(&page("   ", &[])), ParsedResponse::NotFound);
    }

    #[test]
    fn test_missing_name_element_is_not_found() {
        let html = "<html><body><div><div>only one</div></div></body></html>";
        assert_eq!(ResponseParser::new().parse(html), ParsedResponse::NotFound);
    }

    #[test]
    fn test_captcha_marker_wins() {
        // A body that would otherwise parse as a full record
        let html = page("ACME SPA", &[("X", "829900")])
            .replace("</body>", "<p>Por favor reingrese Captcha</p></body>");
        assert_eq!(ResponseParser::new().parse(&html), ParsedResponse::CaptchaRejected);
        assert_eq!(
            ResponseParser::new().parse("Por favor reingrese Captcha"),
            ParsedResponse::CaptchaRejected
        );
    }

    #[test]
    fn test_empty_body_is_malformed() {
        assert!(matches!(
            ResponseParser::new().parse("  \n "),
            ParsedResponse::Malformed(_)
        ));
    }
}
