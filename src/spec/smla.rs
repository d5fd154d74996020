//! SMLA (simultaneous multi-layer access) with cascaded IO.
//!
//! Four stacked layers share the through-silicon IO, each running at a
//! quarter of the IO clock. Timing is therefore expressed in IO clock
//! cycles, four times the single layer WideIO values.

use super::{tables, wide_io, Definition, OrgEntry, SpeedEntry, Standard, Tables};

#[derive(strum::EnumString, strum::EnumIter, strum::Display, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Org {
    SMLA_CIO_1Gb,
    SMLA_CIO_2Gb,
    SMLA_CIO_4Gb,
    SMLA_CIO_8Gb,
}

#[derive(strum::EnumString, strum::EnumIter, strum::Display, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Speed {
    SMLA_CIO_200,
    SMLA_CIO_266,
}

const ORGS: [(u64, usize); 4] = [(256, 1 << 12), (512, 1 << 13), (1024, 1 << 14), (2048, 1 << 15)];

#[rustfmt::skip]
const SPEEDS: [SpeedEntry; 2] = [
    SpeedEntry {
        rate: 200, freq: 200.0, tck: 5.0,
        n_bl: 16, n_ccd: 16, n_dqsck: 1,
        n_cl: 12, n_rcd: 16, n_rp: 16, n_cwl: 1,
        n_ras: 36, n_rc: 48,
        n_rtp: 4, n_rtw: 8, n_wtr: 3, n_wr: 12,
        n_rrd: 8, n_taw: 10,
        n_rfc: 0, n_refi: 0,
        n_cke: 12, n_xp: 8, n_ckesr: 12, n_xsr: 0,
    },
    SpeedEntry {
        rate: 266, freq: 266.67, tck: 3.75,
        n_bl: 16, n_ccd: 16, n_dqsck: 1,
        n_cl: 12, n_rcd: 20, n_rp: 20, n_cwl: 1,
        n_ras: 48, n_rc: 54,
        n_rtp: 4, n_rtw: 8, n_wtr: 4, n_wr: 16,
        n_rrd: 12, n_taw: 14,
        n_rfc: 0, n_refi: 0,
        n_cke: 12, n_xp: 12, n_ckesr: 16, n_xsr: 0,
    },
];

const RFC: [[u64; 4]; 2] = [[72, 104, 168, 248], [96, 140, 224, 332]];
const REFI: [[u64; 4]; 2] = [[3120; 4], [4160; 4]];
const XSR: [[u64; 4]; 2] = [[80, 112, 176, 256], [108, 152, 236, 344]];

#[derive(Debug, Clone, Copy)]
pub struct SmlaCio;

impl Definition for SmlaCio {
    const STANDARD: Standard = Standard::SMLA_CIO;
    const PREFETCH_SIZE: u64 = 4;
    const CHANNEL_WIDTH: u64 = 128;

    type Org = Org;
    type Speed = Speed;

    fn org_entry(org: Org) -> OrgEntry {
        let (size, rows) = ORGS[org as usize];
        wide_io::org_entry(size, rows)
    }

    fn speed_entry(speed: Speed, org: Org) -> SpeedEntry {
        let (s, d) = (speed as usize, org as usize);
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

#[cfg(test)]
mod tests {
    use super::{Org, SmlaCio, Speed};
    use crate::spec::{wide_io, Definition};

    #[test]
    fn test_refresh_is_scaled_by_layers() {
        for (speed, wide_speed) in [
            (Speed::SMLA_CIO_200, wide_io::Speed::WideIO_200),
            (Speed::SMLA_CIO_266, wide_io::Speed::WideIO_266),
        ] {
            let smla = SmlaCio::speed_entry(speed, Org::SMLA_CIO_2Gb);
            let wide = wide_io::WideIO::speed_entry(wide_speed, wide_io::Org::WideIO_2Gb);
            assert_eq!(smla.n_refi, 4 * wide.n_refi);
            assert_eq!(smla.n_rfc, 4 * wide.n_rfc);
            assert_eq!(smla.n_bl, 4 * wide.n_bl);
        }
    }
}
