//! Candidate discovery and paging.

use std::str::FromStr;

use tracing::info;

use crate::{
    Broker,
    db::{ChatId, Gender},
    error::{RelayError, RelayResult},
    pairing,
    transport::{Affordance, Outbound},
};

pub const PAGE_SIZE: usize = 5;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum GenderFilter {
    Only(Gender),
    #[default]
    Random,
}

impl GenderFilter {
    pub fn gender(&self) -> Option<Gender> {
        match self {
            GenderFilter::Only(gender) => Some(*gender),
            GenderFilter::Random => None,
        }
    }
}

impl FromStr for GenderFilter {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "random" | "any" => Ok(GenderFilter::Random),
            other => other.parse::<Gender>().map(GenderFilter::Only),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    pub chat_id: ChatId,
    pub display_name: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page {
    pub index: usize,
    pub items: Vec<Candidate>,
    pub has_prev: bool,
    pub has_next: bool,
}

/// Every unpaired profile other than the requester that passes `filter`.
pub async fn find_candidates(
    broker: &Broker,
    requester_id: ChatId,
    filter: GenderFilter,
) -> RelayResult<Vec<Candidate>> {
    let users = broker.profiles.available(requester_id, filter.gender()).await?;
    Ok(users
        .into_iter()
        .map(|(chat_id, name)| Candidate {
            chat_id,
            display_name: name.unwrap_or_else(|| format!("user {chat_id}")),
        })
        .collect())
}

/// Zero-based slice `[page * PAGE_SIZE, page * PAGE_SIZE + PAGE_SIZE)`.
/// Pages past the end come back empty with no "next".
pub fn paginate(list: &[Candidate], page: usize) -> Page {
    let total_pages = list.len().div_ceil(PAGE_SIZE);
    let start = page.saturating_mul(PAGE_SIZE).min(list.len());
    let end = (start + PAGE_SIZE).min(list.len());

    Page {
        index: page,
        items: list[start..end].to_vec(),
        has_prev: page > 0,
        has_next: page < total_pages.saturating_sub(1),
    }
}

/// Runs a search for `requester_id` and shows the requested page as buttons.
/// The filter is remembered so page buttons can re-query with it.
pub async fn browse(broker: &Broker, requester_id: ChatId, filter: GenderFilter, page: usize) -> RelayResult<Page> {
    let requester = broker.profiles.get(requester_id).await?;
    pairing::require_ready(requester.as_ref())?;

    broker.sessions.set_browse_filter(requester_id, filter);
    let candidates = find_candidates(broker, requester_id, filter).await?;
    info!(requester_id, ?filter, page, found = candidates.len(), "browsing candidates");

    if candidates.is_empty() {
        return Err(RelayError::NoCandidates);
    }

    let page = paginate(&candidates, page);
    broker.transport.notify(render_page(requester_id, &page)).await;
    Ok(page)
}

fn render_page(to: ChatId, page: &Page) -> Outbound {
    let mut affordances: Vec<Affordance> = page
        .items
        .iter()
        .map(|candidate| Affordance::new(&candidate.display_name, candidate.chat_id.to_string()))
        .collect();
    if page.has_prev {
        affordances.push(Affordance::new("Previous page", format!("prev_{}", page.index - 1)));
    }
    if page.has_next {
        affordances.push(Affordance::new("Next page", format!("next_{}", page.index + 1)));
    }

    Outbound::text(to, "Pick someone to chat with.").with_affordances(affordances)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candidates(n: usize) -> Vec<Candidate> {
        (0..n)
            .map(|i| Candidate { chat_id: i as ChatId, display_name: format!("c{i}") })
            .collect()
    }

    #[test]
    fn twelve_candidates_make_three_pages() {
        let list = candidates(12);

        let first = paginate(&list, 0);
        assert_eq!(first.items.len(), 5);
        assert!(!first.has_prev);
        assert!(first.has_next);

        let middle = paginate(&list, 1);
        assert_eq!(middle.items[0].chat_id, 5);
        assert!(middle.has_prev);
        assert!(middle.has_next);

        let last = paginate(&list, 2);
        assert_eq!(last.items.iter().map(|c| c.chat_id).collect::<Vec<_>>(), vec![10, 11]);
        assert!(last.has_prev);
        assert!(!last.has_next);
    }

    #[test]
    fn exact_multiple_has_no_trailing_page() {
        let page = paginate(&candidates(10), 1);
        assert_eq!(page.items.len(), 5);
        assert!(!page.has_next);
    }

    #[test]
    fn out_of_range_page_is_empty() {
        let page = paginate(&candidates(3), 4);
        assert!(page.items.is_empty());
        assert!(page.has_prev);
        assert!(!page.has_next);
    }

    #[test]
    fn filter_parses_random_and_genders() {
        assert_eq!("random".parse::<GenderFilter>(), Ok(GenderFilter::Random));
        assert_eq!("Female".parse::<GenderFilter>(), Ok(GenderFilter::Only(Gender::Female)));
        assert!("robot".parse::<GenderFilter>().is_err());
    }

    #[test]
    fn rendered_page_carries_navigation() {
        let page = paginate(&candidates(12), 1);
        let out = render_page(42, &page);
        assert!(out.has_affordance("5"));
        assert!(out.has_affordance("prev_0"));
        assert!(out.has_affordance("next_2"));
    }
}
