//! Inline detail popup shown when a marker is clicked without an entity handler.

use crate::entity::PointEntity;

/// Summary of a point entity for the marker info popup.
#[derive(Debug, Clone, PartialEq)]
pub struct DetailPopup {
    pub heading: String,
    pub lines: Vec<String>,
}

impl DetailPopup {
    pub fn for_entity(entity: &PointEntity) -> Self {
        let lidar = if entity.auxiliary.is_some() {
            "available"
        } else {
            "none"
        };
        Self {
            heading: entity.title(),
            lines: vec![
                format!("Latitude: {}", entity.lat),
                format!("Longitude: {}", entity.lng),
                format!("LiDAR: {}", lidar),
            ],
        }
    }

    /// Render as an HTML fragment. All text is escaped.
    pub fn to_html(&self) -> String {
        let mut html = format!("<div><h3>{}</h3>", escape_html(&self.heading));
        for line in &self.lines {
            html.push_str(&format!("<p>{}</p>", escape_html(line)));
        }
        html.push_str("</div>");
        html
    }
}

fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_popup_without_lidar() {
        let popup = DetailPopup::for_entity(&PointEntity::new(3, 35.5, 139.25, "Cedar"));
        assert_eq!(popup.heading, "Cedar (ID: 3)");
        assert_eq!(
            popup.lines,
            vec!["Latitude: 35.5", "Longitude: 139.25", "LiDAR: none"]
        );
    }

    #[test]
    fn test_popup_with_lidar() {
        let entity = PointEntity::new(4, 1.0, 2.0, "Oak").with_auxiliary("s3://scans/4.las");
        let popup = DetailPopup::for_entity(&entity);
        assert_eq!(popup.lines[2], "LiDAR: available");
    }

    #[test]
    fn test_html_escapes_label() {
        let entity = PointEntity::new(5, 0.0, 0.0, "<b>Pine</b> & co");
        let html = DetailPopup::for_entity(&entity).to_html();
        assert!(html.starts_with("<div><h3>&lt;b&gt;Pine&lt;/b&gt; &amp; co (ID: 5)</h3>"));
        assert!(html.ends_with("</div>"));
    }
}
