//! Quality and constraint configuration and its switch-string encoding.
//!
//! [`Options`] is the caller-facing configuration record; [`Options::to_switches`]
//! serializes it into the engine's switch string. The encoding is treated as a
//! real serialization format with a fixed grammar, and the engine's
//! switch parser is its inverse for every value this encoder can produce.
//! Values can be built directly, or through the generated [`OptionsBuilder`].

use serde::{Deserialize, Serialize};

/// How refinement may subdivide constrained segments.
#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
pub enum SegmentSplitting {
    /// Any constrained segment may be split.
    #[default]
    Allowed,
    /// Boundary segments stay whole; internal segments may be split (`Y`).
    NoBoundarySplitting,
    /// No constrained segment may be split (`YY`).
    NoSplitting,
}

impl SegmentSplitting {
    const fn tokens(self) -> &'static str {
        match self {
            Self::Allowed => "",
            Self::NoBoundarySplitting => "Y",
            Self::NoSplitting => "YY",
        }
    }
}

/// Configuration for [`triangulate`](crate::ops::triangulate).
///
/// The defaults describe a plain constrained triangulation: both quality
/// bounds sit at their disabled value `0`, the Steiner cap at its
/// unbounded sentinel `-1`.
///
/// ```rust
/// use trigen::{Options, OptionsBuilder, SegmentSplitting};
///
/// let options = OptionsBuilder::default()
///     .min_angle(25.0)
///     .max_area(0.5)
///     .segment_splitting(SegmentSplitting::NoBoundarySplitting)
///     .build()
///     .unwrap();
/// assert_eq!(options.to_switches(), "zq25a0.5Y");
/// ```
#[derive(Builder, Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct Options {
    /// Allow Steiner vertices on segments until the mesh is conforming
    /// Delaunay (`D`).
    #[builder(default = "false")]
    pub conforming_delaunay: bool,
    /// Enclose the convex hull instead of eating exterior triangles (`c`).
    #[builder(default = "false")]
    pub convex_hull: bool,
    /// Where refinement may split constrained segments (`Y`/`YY`).
    #[builder(default = "SegmentSplitting::Allowed")]
    pub segment_splitting: SegmentSplitting,
    /// Maximum triangle area (`a`); `<= 0` disables the bound.
    #[builder(default = "0.0")]
    pub max_area: f64,
    /// Minimum interior angle in degrees (`q`); `<= 0` disables the bound.
    #[builder(default = "0.0")]
    pub min_angle: f64,
    /// Cap on inserted Steiner points (`S<N>`); negative means unbounded.
    #[builder(default = "-1")]
    pub steiner_limit: i32,
    /// Emit the edge list of the output mesh (`e`).
    #[builder(default = "false")]
    pub edge_list: bool,
    /// Emit the neighbor list of the output mesh (`n`).
    #[builder(default = "false")]
    pub neighbor_list: bool,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            conforming_delaunay: false,
            convex_hull: false,
            segment_splitting: SegmentSplitting::Allowed,
            max_area: 0.0,
            min_angle: 0.0,
            steiner_limit: -1,
            edge_list: false,
            neighbor_list: false,
        }
    }
}

impl Options {
    /// Serialize into the engine's switch string.
    ///
    /// Always emits `z`, the minimum angle as `q<angle>` and the maximum
    /// area as `a<area>` (default `Display` formatting, which the engine's
    /// numeric parser reads back exactly), then one token per active
    /// toggle. Pure and total; numeric ranges are not validated here.
    #[must_use]
    pub fn to_switches(&self) -> String {
        let mut switches = format!("zq{}a{}", self.min_angle, self.max_area);
        if self.conforming_delaunay {
            switches.push('D');
        }
        if self.convex_hull {
            switches.push('c');
        }
        if self.steiner_limit >= 0 {
            switches.push('S');
            switches.push_str(&self.steiner_limit.to_string());
        }
        switches.push_str(self.segment_splitting.tokens());
        if self.edge_list {
            switches.push('e');
        }
        if self.neighbor_list {
            switches.push('n');
        }
        switches
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mesher::{Behavior, SplitPolicy};

    #[test]
    fn default_options_encode_to_the_vacuous_quality_string() {
        assert_eq!(Options::default().to_switches(), "zq0a0");
    }

    #[test]
    fn every_toggle_lands_in_the_switch_string() {
        let options = Options {
            conforming_delaunay: true,
            convex_hull: true,
            segment_splitting: SegmentSplitting::NoSplitting,
            max_area: 0.1,
            min_angle: 20.5,
            steiner_limit: 500,
            edge_list: true,
            neighbor_list: true,
        };
        assert_eq!(options.to_switches(), "zq20.5a0.1DcS500YYen");
    }

    #[test]
    fn a_negative_cap_means_unbounded() {
        let options = Options {
            steiner_limit: -1,
            ..Options::default()
        };
        assert!(!options.to_switches().contains('S'));

        let capped = Options {
            steiner_limit: 0,
            ..Options::default()
        };
        assert_eq!(capped.to_switches(), "zq0a0S0");
    }

    #[test]
    fn boundary_splitting_encodes_one_y_and_no_splitting_two() {
        let boundary = Options {
            segment_splitting: SegmentSplitting::NoBoundarySplitting,
            ..Options::default()
        };
        assert_eq!(boundary.to_switches(), "zq0a0Y");

        let never = Options {
            segment_splitting: SegmentSplitting::NoSplitting,
            ..Options::default()
        };
        assert_eq!(never.to_switches(), "zq0a0YY");
    }

    #[test]
    fn the_switch_parser_reads_back_every_encoded_value() {
        let options = Options {
            conforming_delaunay: true,
            convex_hull: true,
            segment_splitting: SegmentSplitting::NoBoundarySplitting,
            max_area: 12.75,
            min_angle: 28.6,
            steiner_limit: 42,
            edge_list: true,
            neighbor_list: false,
        };
        let behavior = Behavior::parse(&options.to_switches());

        assert!(behavior.zero_indexed);
        assert_eq!(behavior.min_angle, 28.6);
        assert_eq!(behavior.max_area, 12.75);
        assert!(behavior.conforming);
        assert!(behavior.convex_hull);
        assert_eq!(behavior.steiner_limit, 42);
        assert_eq!(behavior.splitting, SplitPolicy::NoBoundary);
        assert!(behavior.edge_list);
        assert!(!behavior.neighbor_list);
    }

    #[test]
    fn builder_defaults_match_the_default_value() {
        let built = OptionsBuilder::default().build().unwrap();
        assert_eq!(built, Options::default());
    }

    #[test]
    fn options_round_trip_through_serde() {
        let options = Options {
            min_angle: 33.0,
            segment_splitting: SegmentSplitting::NoSplitting,
            ..Options::default()
        };
        let json = serde_json::to_string(&options).unwrap();
        let back: Options = serde_json::from_str(&json).unwrap();
        assert_eq!(back, options);
    }
}
