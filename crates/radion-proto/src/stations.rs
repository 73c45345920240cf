//! Station list: `name,url` CSV from a local file, a URL, the cached default
//! list, or the bundled fallback.

use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use crate::config::StationsConfig;
use crate::platform;

const BUNDLED_STATIONS_CSV: &str = "Jazz Groove,https://audio-edge-cmc51.fra.h.radiomast.io/f0ac4bf3-bbe5-4edb-b828-193e0fdc4f2f
KCSM Jazz Tonight,https://ice7.securenetsystems.net/KCSM2
Jazz24,https://prod-52-201-196-36.amperwave.net/ppm-jazz24aac256-ibc1
Seeburg 1000,https://psn3.prostreaming.net/proxy/seeburg/stream/;
Chillsky,https://lfhh.radioca.st/stream
9128live,https://streams.radio.co/s0aa1e6f4a/listen
Nightride,https://stream.nightride.fm/nightride.ogg
Jungletrain.net,http://stream1.jungletrain.net:8000
Prysm Deepinside,https://n16a-eu.rcs.revma.com/7tkkn1yuhnruv
Deep Motion FM,https://vm.motionfm.com/motionone_aacp
Lounge Motion FM,https://vm.motionfm.com/motionthree_aacp
Smooth Motion FM,https://vm.motionfm.com/motiontwo_aacp
SomaFM: Beat Blender,https://somafm.com/beatblender.pls
SomaFM: Bossa Beyond,https://somafm.com/bossa256.pls
SomaFM: Groove Salad Classic,https://somafm.com/gsclassic130.pls
SomaFM: Sonic Universe,https://somafm.com/sonicuniverse256.pls
SomaFM: DEF CON Radio,http://somafm.com/defcon.pls
SomaFM: Fluid,http://somafm.com/fluid130.pls
SomaFM: Illinois Street Lounge,http://somafm.com/illstreet.pls
SomaFM: Vaporwaves,http://somafm.com/vaporwaves.pls
SomaFM: Drone Zone,http://somafm.com/dronezone.pls
SomaFM: Deep Space One,https://somafm.com/deepspaceone130.pls
Big FM,https://stream.bigfm.de/oldschoolrap/aac-128/radiode";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Station {
    pub name: String,
    pub url: String,
}

/// Ordered stations; the index is what the UI hands back on selection.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StationList {
    stations: Vec<Station>,
}

impl StationList {
    pub fn new(stations: Vec<Station>) -> Self {
        Self { stations }
    }

    pub fn bundled() -> Self {
        Self::new(parse_csv(BUNDLED_STATIONS_CSV))
    }

    pub fn len(&self) -> usize {
        self.stations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stations.is_empty()
    }

    pub fn get(&self, idx: usize) -> Option<&Station> {
        self.stations.get(idx)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Station> {
        self.stations.iter()
    }

    fn or_bundled(self) -> Self {
        if self.is_empty() {
            warn!("stations: list is empty, using bundled defaults");
            Self::bundled()
        } else {
            self
        }
    }
}

/// Parse `name,url` lines.  Both sides are trimmed; anything after a second
/// comma stays part of the url.  Blank and malformed lines are skipped.
pub fn parse_csv(content: &str) -> Vec<Station> {
    content
        .lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .filter_map(|(lineno, line)| match line.split_once(',') {
            Some((name, url)) if !url.trim().is_empty() => Some(Station {
                name: name.trim().to_string(),
                url: url.trim().to_string(),
            }),
            _ => {
                warn!("stations: skipping malformed line {}: {:?}", lineno + 1, line);
                None
            }
        })
        .collect()
}

/// Resolve the station list for `source` (a path or an http(s) URL).
///
/// With no source the cached default list is used, falling back to the
/// bundled one, and the cache is refreshed in the background.
pub async fn load(source: Option<&str>, cfg: &StationsConfig) -> anyhow::Result<StationList> {
    let list = match source {
        None => {
            spawn_cache_refresh(cfg.default_url.clone(), cached_list_path());
            match tokio::fs::read_to_string(cached_list_path()).await {
                Ok(content) => {
                    debug!("stations: using cached default list");
                    StationList::new(parse_csv(&content))
                }
                Err(_) => StationList::bundled(),
            }
        }
        Some(url) if url.starts_with("http") => match fetch(url).await {
            Ok(content) => StationList::new(parse_csv(&content)),
            Err(e) => {
                warn!("stations: failed to fetch {}: {:#}", url, e);
                StationList::bundled()
            }
        },
        Some(path) => load_file(Path::new(path)).await?,
    };
    info!("stations: {} loaded", list.len());
    Ok(list.or_bundled())
}

pub async fn load_file(path: &Path) -> anyhow::Result<StationList> {
    let content = tokio::fs::read_to_string(path)
        .await
        .map_err(|e| anyhow::anyhow!("cannot read station list {}: {}", path.display(), e))?;
    Ok(StationList::new(parse_csv(&content)))
}

pub fn cached_list_path() -> PathBuf {
    platform::cache_dir().join("stations.csv")
}

async fn fetch(url: &str) -> anyhow::Result<String> {
    let resp = reqwest::get(url).await?.error_for_status()?;
    Ok(resp.text().await?)
}

fn spawn_cache_refresh(url: String, cache_path: PathBuf) {
    tokio::spawn(async move {
        if let Err(e) = refresh_cache(&url, &cache_path).await {
            warn!("stations: cache refresh failed: {:#}", e);
        }
    });
}

async fn refresh_cache(url: &str, cache_path: &Path) -> anyhow::Result<()> {
    let content = fetch(url).await?;
    if parse_csv(&content).is_empty() {
        anyhow::bail!("downloaded list from {} has no stations", url);
    }
    if let Some(parent) = cache_path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    tokio::fs::write(cache_path, content).await?;
    debug!("stations: cached default list at {:?}", cache_path);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_trims_names_and_urls() {
        let stations =
            parse_csv("  Jazz24 , https://jazz24/stream  \n\nNightride,https://n/ride.ogg\n");
        assert_eq!(
            stations,
            vec![
                Station {
                    name: "Jazz24".into(),
                    url: "https://jazz24/stream".into()
                },
                Station {
                    name: "Nightride".into(),
                    url: "https://n/ride.ogg".into()
                },
            ]
        );
    }

    #[test]
    fn malformed_lines_are_skipped() {
        let stations = parse_csv("no comma here\nEmpty Url,   \nOk,http://ok\n");
        assert_eq!(stations.len(), 1);
        assert_eq!(stations[0].name, "Ok");
    }

    #[test]
    fn url_keeps_extra_commas() {
        let stations = parse_csv("Odd,http://x/?a=1,2");
        assert_eq!(stations[0].url, "http://x/?a=1,2");
    }

    #[test]
    fn bundled_list_is_well_formed() {
        let list = StationList::bundled();
        assert_eq!(list.len(), 23);
        assert!(list.iter().all(|s| s.url.starts_with("http")));
        assert_eq!(list.get(0).unwrap().name, "Jazz Groove");
    }

    #[tokio::test]
    async fn load_reads_local_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("stations.csv");
        std::fs::write(&path, "A,http://a\nB,http://b\n").unwrap();

        let list = load(path.to_str(), &StationsConfig::default()).await.unwrap();
        assert_eq!(list.len(), 2);
        assert_eq!(list.get(1).unwrap().url, "http://b");
    }

    #[tokio::test]
    async fn missing_local_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("absent.csv");
        assert!(load(path.to_str(), &StationsConfig::default()).await.is_err());
    }

    #[tokio::test]
    async fn empty_file_falls_back_to_bundled() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("empty.csv");
        std::fs::write(&path, "\n\n").unwrap();
        let list = load(path.to_str(), &StationsConfig::default()).await.unwrap();
        assert_eq!(list, StationList::bundled());
    }
}
