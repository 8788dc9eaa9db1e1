//! Dashboard: both account queries plus the numbers shown above them

use serde::Serialize;

use crate::domain::clicks::total_clicks;
use crate::domain::{ClickCount, DateRange, ShortLink};
use crate::services::queries::{MyLinksQuery, TotalClicks, TotalClicksQuery};
use crate::services::query::QueryState;

/// Headline numbers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardSummary {
    pub total_links: usize,
    pub total_clicks: u64,
}

impl DashboardSummary {
    pub fn from_data(links: &[ShortLink], clicks: &[ClickCount]) -> Self {
        Self {
            total_links: links.len(),
            total_clicks: total_clicks(clicks),
        }
    }
}

/// One snapshot of the dashboard
#[derive(Debug, Clone)]
pub struct DashboardView {
    pub links: QueryState<Vec<ShortLink>>,
    pub clicks: QueryState<Vec<ClickCount>>,
}

impl DashboardView {
    /// Available once both queries succeeded
    pub fn summary(&self) -> Option<DashboardSummary> {
        match (self.links.data(), self.clicks.data()) {
            (Some(links), Some(clicks)) => Some(DashboardSummary::from_data(links, clicks)),
            _ => None,
        }
    }

    pub fn is_loading(&self) -> bool {
        self.links.is_loading() || self.clicks.is_loading()
    }
}

pub struct DashboardService {
    links: MyLinksQuery,
    clicks: TotalClicksQuery,
}

impl DashboardService {
    pub fn new(links: MyLinksQuery, clicks: TotalClicksQuery) -> Self {
        Self { links, clicks }
    }

    pub fn links(&self) -> &MyLinksQuery {
        &self.links
    }

    pub fn clicks(&self) -> &TotalClicksQuery {
        &self.clicks
    }

    pub fn range(&self) -> DateRange {
        self.clicks.with_spec(|spec| spec.range)
    }

    pub fn set_range(&self, range: DateRange) {
        self.clicks.set_spec(TotalClicks::new(range));
    }

    /// Current states without touching the network
    pub fn view(&self) -> DashboardView {
        DashboardView {
            links: self.links.state(),
            clicks: self.clicks.state(),
        }
    }

    /// Fetch both queries, honouring the cache
    pub fn load(&self) -> DashboardView {
        DashboardView {
            links: self.links.fetch(),
            clicks: self.clicks.fetch(),
        }
    }

    /// Refetch both, e.g. after a link was created
    pub fn refresh(&self) -> DashboardView {
        DashboardView {
            links: self.links.refetch(),
            clicks: self.clicks.refetch(),
        }
    }
}
