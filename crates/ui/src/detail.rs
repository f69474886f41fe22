//! Detail view model for a selected spot and its markup.

use foundation::{LngLat, SpotId};
use streaming::{Spot, VoteCounts};
use votes::VoteKind;

use crate::carousel::carousel_html;
use crate::description::DEFAULT_COLLAPSED_PX;
use crate::html::escape_html;
use crate::layout::Presentation;

pub const DEFAULT_TITLE: &str = "Café";

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum DetailSection {
    Carousel,
    /// Title, address and tags.
    Identity,
    Description,
    /// External link and directions.
    Actions,
    Votes,
}

/// Desktop leads with images; mobile leads with identity and actions.
pub fn section_order(
    presentation: Presentation,
    has_images: bool,
    has_description: bool,
) -> Vec<DetailSection> {
    use DetailSection::*;

    let order: &[DetailSection] = match presentation {
        Presentation::Popup => &[Carousel, Identity, Description, Actions, Votes],
        Presentation::BottomSheet => &[Identity, Actions, Votes, Carousel, Description],
    };
    order
        .iter()
        .copied()
        .filter(|s| match s {
            Carousel => has_images,
            Description => has_description,
            _ => true,
        })
        .collect()
}

pub fn directions_url(position: LngLat) -> String {
    format!(
        "https://www.google.com/maps/dir/?api=1&destination={},{}",
        position.lat, position.lng
    )
}

#[derive(Debug, Clone, PartialEq)]
pub struct DetailView {
    pub id: SpotId,
    /// Anchor for the popup.
    pub position: LngLat,
    pub title: String,
    pub address: String,
    pub tags: Vec<String>,
    pub description: String,
    pub info_link: Option<String>,
    pub directions_url: String,
    pub images: Vec<String>,
    pub vote: Option<VoteKind>,
    pub counts: VoteCounts,
    pub presentation: Presentation,
    pub sections: Vec<DetailSection>,
    /// Height of the description before it is expanded.
    pub description_collapsed_px: f64,
}

impl DetailView {
    pub fn build(
        spot: &Spot,
        vote: Option<VoteKind>,
        counts: VoteCounts,
        presentation: Presentation,
    ) -> Self {
        let title = if spot.name.trim().is_empty() {
            DEFAULT_TITLE.to_string()
        } else {
            spot.name.clone()
        };
        Self {
            id: spot.id.clone(),
            position: spot.position,
            title,
            address: spot.address.clone(),
            tags: spot.tags.clone(),
            description: spot.description.clone(),
            info_link: spot.button_link.clone(),
            directions_url: directions_url(spot.position),
            images: spot.image_urls.clone(),
            vote,
            counts,
            presentation,
            sections: section_order(
                presentation,
                !spot.image_urls.is_empty(),
                !spot.description.trim().is_empty(),
            ),
            description_collapsed_px: DEFAULT_COLLAPSED_PX,
        }
    }

    pub fn with_collapsed_height(mut self, px: f64) -> Self {
        self.description_collapsed_px = px;
        self
    }

    pub fn description_id(&self) -> String {
        format!("mp-desc-{}", self.id)
    }

    pub fn to_html(&self) -> String {
        let mut body = String::new();
        for section in &self.sections {
            match section {
                DetailSection::Carousel => body.push_str(&carousel_html(&self.images, &self.id)),
                DetailSection::Identity => body.push_str(&self.identity_html()),
                DetailSection::Description => body.push_str(&self.description_html()),
                DetailSection::Actions => body.push_str(&self.actions_html()),
                DetailSection::Votes => body.push_str(&votes_html(self.vote, self.counts)),
            }
        }
        let modifier = match self.presentation {
            Presentation::Popup => "",
            Presentation::BottomSheet => " map-popup--sheet",
        };
        format!(
            r#"<div class="map-popup{modifier}" data-spot-id="{}"><div class="mp-body">{body}</div></div>"#,
            escape_html(self.id.as_str())
        )
    }

    fn identity_html(&self) -> String {
        let mut out = format!(r#"<h3 class="mp-title">{}</h3>"#, escape_html(&self.title));
        if !self.address.is_empty() {
            out.push_str(&format!(r#"<p class="mp-address">{}</p>"#, escape_html(&self.address)));
        }
        if !self.tags.is_empty() {
            out.push_str(r#"<div class="mp-tags">"#);
            for tag in &self.tags {
                out.push_str(&format!(r#"<span class="mp-tag">{}</span>"#, escape_html(tag)));
            }
            out.push_str("</div>");
        }
        out
    }

    fn description_html(&self) -> String {
        let id = escape_html(&self.description_id());
        format!(
            concat!(
                r#"<div class="mp-desc-wrapper">"#,
                r#"<div class="mp-desc" id="{id}" data-collapsed="true" style="max-height:{max_height}px;overflow:hidden;">{text}</div>"#,
                r#"<a href="" class="mp-toggle-link" role="button" aria-controls="{id}" aria-expanded="false" style="display:none;margin-top:6px;">Voir plus</a>"#,
                "</div>"
            ),
            id = id,
            max_height = self.description_collapsed_px,
            text = escape_html(&self.description),
        )
    }

    fn actions_html(&self) -> String {
        let mut out = String::from(r#"<div class="mp-actions">"#);
        if let Some(link) = &self.info_link {
            out.push_str(&format!(
                r#"<a class="mp-link" href="{}" target="_blank" rel="noopener">Infos</a>"#,
                escape_html(link)
            ));
        }
        out.push_str(&format!(
            r#"<a class="mp-primary" href="{}" target="_blank" rel="noopener">Itinéraire</a>"#,
            escape_html(&self.directions_url)
        ));
        out.push_str("</div>");
        out
    }
}

/// Vote buttons; `aria-pressed` mirrors the visitor's current vote.
pub fn votes_html(vote: Option<VoteKind>, counts: VoteCounts) -> String {
    let button = |kind: VoteKind, label: &str, count: u32| {
        let pressed = vote == Some(kind);
        format!(
            r#"<button type="button" class="mp-vote mp-vote--{seg}" data-vote="{seg}" aria-pressed="{pressed}" aria-label="{label}"><span class="mp-vote-count">{count}</span></button>"#,
            seg = kind.path_segment(),
        )
    };
    format!(
        r#"<div class="mp-votes">{}{}</div>"#,
        button(VoteKind::Like, "J'aime", counts.likes),
        button(VoteKind::Dislike, "Je n'aime pas", counts.dislikes)
    )
}
