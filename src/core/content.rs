//! Copy for the landing view.

use time::OffsetDateTime;

pub const BRAND: &str = "WrapRewards";
pub const TAGLINE: &str = "Turn your daily drive into passive income.";
pub const CALL_TO_ACTION: &str = "Start Earning Now";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Feature {
    pub title: &'static str,
    pub description: &'static str,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LandingSection {
    pub heading: &'static str,
    /// Render items as a numbered sequence rather than a grid of cards.
    pub numbered: bool,
    pub items: &'static [Feature],
}

pub const HOW_IT_WORKS: LandingSection = LandingSection {
    heading: "Simple, Smart, Passive Income.",
    numbered: true,
    items: &[
        Feature {
            title: "Register Your Ride",
            description: "Tell us about your vehicle and your driving routes.",
        },
        Feature {
            title: "Match & Wrap",
            description: "We analyze your profile and match you with a high-paying brand campaign.",
        },
        Feature {
            title: "Get Paid Monthly",
            description: "Receive guaranteed passive income deposited directly into your account.",
        },
    ],
};

pub const OWNER_BENEFITS: LandingSection = LandingSection {
    heading: "Benefits for Car Owners",
    numbered: false,
    items: &[
        Feature {
            title: "Guaranteed Income",
            description: "Turn your daily commute into a reliable, consistent income stream without extra effort.",
        },
        Feature {
            title: "Zero Vehicle Damage",
            description: "High-quality, removable vinyl wraps protect your paint and leave no residue upon removal.",
        },
        Feature {
            title: "Flexible Campaigns",
            description: "Choose campaigns that fit your lifestyle and your geographic location.",
        },
    ],
};

pub const ADVERTISER_BENEFITS: LandingSection = LandingSection {
    heading: "A New Channel for Advertisers",
    numbered: false,
    items: &[
        Feature {
            title: "Superior ROI",
            description: "Target specific demographics and geographies with a high-impact, mobile ad format.",
        },
        Feature {
            title: "High Visibility",
            description: "Achieve massive local exposure on major roadways and urban centers, reaching thousands daily.",
        },
        Feature {
            title: "Detailed Analytics",
            description: "Get real-time data on campaign reach, impressions, and driver routes.",
        },
    ],
};

pub static SECTIONS: [LandingSection; 3] = [HOW_IT_WORKS, OWNER_BENEFITS, ADVERTISER_BENEFITS];

pub fn footer(year: i32) -> String {
    format!("© {year} {BRAND}. All rights reserved.")
}

pub fn current_footer() -> String {
    footer(OffsetDateTime::now_utc().year())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn three_sections_of_three() {
        assert!(SECTIONS.iter().all(|section| section.items.len() == 3));
        assert_eq!(SECTIONS.iter().filter(|section| section.numbered).count(), 1);
    }

    #[test]
    fn footer_text() {
        assert_eq!(footer(2025), "© 2025 WrapRewards. All rights reserved.");
    }
}
