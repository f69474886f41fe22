use foundation::SpotId;
use streaming::MAX_IMAGES;

use crate::html::escape_html;

/// Horizontal travel, in pixels, that counts as a swipe.
pub const SWIPE_THRESHOLD_PX: f64 = 30.0;

/// Active-slide state of the image carousel. Indices wrap in both directions.
#[derive(Debug, Clone, PartialEq)]
pub struct Carousel {
    count: usize,
    active: usize,
    touch_start_x: Option<f64>,
}

impl Carousel {
    pub fn new(count: usize) -> Self {
        Self {
            count: count.min(MAX_IMAGES),
            active: 0,
            touch_start_x: None,
        }
    }

    pub fn count(&self) -> usize {
        self.count
    }

    pub fn active(&self) -> usize {
        self.active
    }

    /// Arrows and dots only make sense with more than one slide.
    pub fn has_controls(&self) -> bool {
        self.count > 1
    }

    pub fn go_to(&mut self, index: isize) -> usize {
        if self.count > 0 {
            let n = self.count as isize;
            self.active = index.rem_euclid(n) as usize;
        }
        self.active
    }

    pub fn next(&mut self) -> usize {
        self.go_to(self.active as isize + 1)
    }

    pub fn prev(&mut self) -> usize {
        self.go_to(self.active as isize - 1)
    }

    pub fn touch_start(&mut self, x: f64) {
        self.touch_start_x = Some(x);
    }

    /// Returns `true` when the touch moved the carousel.
    pub fn touch_end(&mut self, x: f64) -> bool {
        let Some(start) = self.touch_start_x.take() else {
            return false;
        };
        let dx = x - start;
        if dx.abs() <= SWIPE_THRESHOLD_PX {
            return false;
        }
        if dx < 0.0 {
            self.next();
        } else {
            self.prev();
        }
        true
    }
}

/// Carousel markup; empty when there are no images.
pub fn carousel_html(images: &[String], spot_id: &SpotId) -> String {
    let urls: Vec<&String> = images.iter().filter(|u| !u.is_empty()).take(MAX_IMAGES).collect();
    if urls.is_empty() {
        return String::new();
    }

    let mut slides = String::new();
    for (i, url) in urls.iter().enumerate() {
        let active = if i == 0 { " is-active" } else { "" };
        slides.push_str(&format!(
            r#"<div class="mpc-slide{active}" data-index="{i}"><img src="{}" alt="Photo {}" loading="lazy" decoding="async"></div>"#,
            escape_html(url),
            i + 1
        ));
    }

    let mut controls = String::new();
    if urls.len() > 1 {
        controls.push_str(
            r#"<button class="mpc-nav mpc-prev" aria-label="Précédent" data-dir="-1"></button><button class="mpc-nav mpc-next" aria-label="Suivant" data-dir="1"></button><div class="mpc-dots">"#,
        );
        for i in 0..urls.len() {
            let active = if i == 0 { " is-active" } else { "" };
            controls.push_str(&format!(
                r#"<button class="mpc-dot{active}" data-to="{i}" aria-label="Aller à l’image {}"></button>"#,
                i + 1
            ));
        }
        controls.push_str("</div>");
    }

    format!(
        r#"<div class="mp-carousel" id="mpc-{}" data-count="{}" data-active="0"><div class="mpc-viewport">{slides}</div>{controls}</div>"#,
        escape_html(spot_id.as_str()),
        urls.len()
    )
}
