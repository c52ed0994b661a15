//! Shared types used across GPFGRAPH.
//! `Toolbox` identifies which generation of the ESA toolbox executes a graph;
//! the choice drives the gpt launcher spelling and the default raster output
//! format written by terminal `Write` nodes.
use clap::ValueEnum;
use serde::{Deserialize, Serialize};

#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, ValueEnum, Debug, Serialize, Deserialize)]
pub enum Toolbox {
    /// The legacy BEAM toolbox (gpt.sh / gpt.bat launchers, plain GeoTIFF output).
    Beam,
    /// The current SNAP toolbox (single gpt launcher, BigTIFF-capable output).
    Snap,
}

impl std::fmt::Display for Toolbox {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Toolbox::Beam => "BEAM",
            Toolbox::Snap => "SNAP",
        };
        write!(f, "{}", s)
    }
}

impl Toolbox {
    /// Default `formatName` for outputs that are neither `.dim` nor `.hdr`.
    /// BEAM predates BigTIFF support, so the two generations differ here.
    pub fn default_raster_format(&self) -> &'static str {
        match self {
            Toolbox::Beam => "GeoTIFF",
            Toolbox::Snap => "GeoTIFF-BigTIFF",
        }
    }
}
