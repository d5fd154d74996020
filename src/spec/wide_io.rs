use super::{tables, Definition, Level, OrgEntry, SpeedEntry, Standard, Tables};
use strum::EnumCount;

/// Organizations.
#[derive(strum::EnumString, strum::EnumIter, strum::Display, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Org {
    WideIO_1Gb,
    WideIO_2Gb,
    WideIO_4Gb,
    WideIO_8Gb,
}

impl Org {
    fn density_index(self) -> usize {
        self as usize
    }
}

/// Speed bins.
#[derive(strum::EnumString, strum::EnumIter, strum::Display, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Speed {
    WideIO_200,
    WideIO_266,
}

pub(super) fn org_entry(size: u64, rows: usize) -> OrgEntry {
    let mut count = [0; Level::COUNT];
    count[Level::Rank as usize] = 1;
    count[Level::Bank as usize] = 4;
    count[Level::Row as usize] = rows;
    count[Level::Column as usize] = 1 << 7;
    OrgEntry {
        size,
        dq: 128,
        count,
    }
}

const ORGS: [(u64, usize); 4] = [(256, 1 << 12), (512, 1 << 13), (1024, 1 << 14), (2048, 1 << 15)];

#[rustfmt::skip]
const SPEEDS: [SpeedEntry; 2] = [
    SpeedEntry {
        rate: 200, freq: 200.0, tck: 5.0,
        n_bl: 4, n_ccd: 4, n_dqsck: 1,
        n_cl: 3, n_rcd: 4, n_rp: 4, n_cwl: 1,
        n_ras: 9, n_rc: 12,
        n_rtp: 1, n_rtw: 2, n_wtr: 1, n_wr: 3,
        n_rrd: 2, n_taw: 10,
        n_rfc: 0, n_refi: 0,
        n_cke: 3, n_xp: 2, n_ckesr: 3, n_xsr: 0,
    },
    SpeedEntry {
        rate: 266, freq: 266.67, tck: 3.75,
        n_bl: 4, n_ccd: 4, n_dqsck: 1,
        n_cl: 3, n_rcd: 5, n_rp: 5, n_cwl: 1,
        n_ras: 12, n_rc: 14,
        n_rtp: 1, n_rtw: 2, n_wtr: 1, n_wr: 4,
        n_rrd: 3, n_taw: 14,
        n_rfc: 0, n_refi: 0,
        n_cke: 3, n_xp: 3, n_ckesr: 4, n_xsr: 0,
    },
];

/// Refresh cycle time per (speed, density)
const RFC: [[u64; 4]; 2] = [[18, 26, 42, 62], [24, 35, 56, 83]];
/// Refresh interval per (speed, density)
const REFI: [[u64; 4]; 2] = [[780; 4], [1040; 4]];
/// Self-refresh exit per (speed, density)
const XSR: [[u64; 4]; 2] = [[20, 28, 44, 64], [27, 38, 59, 86]];

/// WideIO, single layer, four channels per die.
#[derive(Debug, Clone, Copy)]
pub struct WideIO;

impl Definition for WideIO {
    const STANDARD: Standard = Standard::WideIO;
    const PREFETCH_SIZE: u64 = 4;
    const CHANNEL_WIDTH: u64 = 128;

    type Org = Org;
    type Speed = Speed;

    fn org_entry(org: Org) -> OrgEntry {
        let (size, rows) = ORGS[org.density_index()];
        org_entry(size, rows)
    }

    fn speed_entry(speed: Speed, org: Org) -> SpeedEntry {
        let (s, d) = (speed as usize, org.density_index());
        SpeedEntry {
            n_rfc: RFC[s][d],
            n_refi: REFI[s][d],
            n_xsr: XSR[s][d],
            ..SPEEDS[s]
        }
    }

    fn tables(speed: &SpeedEntry) -> Tables {
        tables::wide_io_family(speed)
    }
}
