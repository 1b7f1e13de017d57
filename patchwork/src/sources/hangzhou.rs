//! Tile services of the Hangzhou municipal geoinformation platform.

use super::Attribution;
use crate::grid::GridConfig;
use crate::lon_lat;

/// The dark vector basemap, as served by the municipal tile service. Thirteen levels,
/// matching host zooms 8 through 20.
pub fn vector_dark() -> GridConfig {
    GridConfig {
        tile_size: 256,
        cache_size: 5000,
        zoom_offset: 8,
        resolutions: vec![
            0.00549933137239034,
            0.00274966568619517,
            0.00137483284309758,
            0.000687416421548792,
            0.000343708210774396,
            0.000171854105387198,
            8.5927052693599e-5,
            4.29635263467995e-5,
            2.14817631733998e-5,
            1.07408815866999e-5,
            5.37044079334994e-6,
            2.68522039667497e-6,
            1.34261019833748e-6,
        ],
        origin: lon_lat(118.122911693886, 31.2869311022836),
        bounds: (
            lon_lat(118.339420417, 40.5653723350001),
            lon_lat(120.725803952416, 20.1883223780912),
        ),
        upstream: vec![
            "https://cb.hangzhoumap.gov.cn/E36CCEA93443D1495DB9B9F2B2FFE348CB1A367D75176F815040AB19E54CDCA5DAAA25813AF965E2ABD0CC2463DD1223/PBS/rest/services/hzsyvector_dark/Mapserver/tile"
                .to_string(),
        ],
    }
}

pub fn attribution() -> Attribution {
    Attribution {
        text: "Hangzhou Municipal Bureau of Planning and Natural Resources",
        url: "https://cb.hangzhoumap.gov.cn/",
    }
}
