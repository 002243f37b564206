/// Client counts per acquisition channel. `direct + partner` always equals
/// the count that was split.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ChannelSplit {
    pub direct: u64,
    pub partner: u64,
}

impl ChannelSplit {
    pub fn total(self) -> u64 {
        self.direct.saturating_add(self.partner)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ChannelRevenue {
    pub direct: f64,
    pub partner: f64,
}

impl ChannelRevenue {
    pub fn add(&mut self, other: ChannelRevenue) {
        self.direct += other.direct;
        self.partner += other.partner;
    }
}

/// Direct gets the floor of its share, partner takes the remainder.
pub fn split_clients(count: u64, direct_ratio: f64) -> ChannelSplit {
    let ratio = direct_ratio.clamp(0.0, 1.0);
    // Nudge past binary representation error, e.g. 100 * 0.29 = 28.999...
    let direct = ((count as f64 * ratio + 1e-9).floor() as u64).min(count);
    ChannelSplit {
        direct,
        partner: count - direct,
    }
}

/// Revenue of one tier attributed to channels. New clients are billed to the
/// channel that acquired them; the rest of the base is attributed by ratio,
/// since channel membership is not tracked per client.
pub fn attribute_tier_revenue(
    split: ChannelSplit,
    active_clients: u64,
    price: f64,
    integration_price: f64,
    direct_ratio: f64,
) -> ChannelRevenue {
    let ratio = direct_ratio.clamp(0.0, 1.0);
    let per_new_client = price + integration_price;
    let existing = active_clients.saturating_sub(split.total()) as f64 * price;
    ChannelRevenue {
        direct: split.direct as f64 * per_new_client + existing * ratio,
        partner: split.partner as f64 * per_new_client + existing * (1.0 - ratio),
    }
}
