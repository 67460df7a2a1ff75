//! In-memory stand-in for the registry site
//!
//! `MockSite` implements `DomDriver` over a fixed region → comuna → school
//! hierarchy. It understands the default site selectors, serves detail pages
//! as HTML strings, and can inject faults or a stop request.

use mineduc_harvest::browser::{
    DomDriver, DriverError, DriverResult, ElementSnapshot, Locator, Readiness,
};
use mineduc_harvest::config::{Config, OutputConfig, SiteConfig};
use mineduc_harvest::model::SchoolRecord;
use mineduc_harvest::output::{CsvRecordSink, ExportKind, OutputResult, RecordSink};
use mineduc_harvest::state::CrawlCursor;
use mineduc_harvest::storage::{CheckpointResult, CheckpointStore, JsonCheckpointStore};
use mineduc_harvest::StopSignal;
use std::cell::RefCell;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::rc::Rc;

pub struct MockSchool {
    pub code: String,
    pub html: String,
}

pub struct MockComuna {
    pub id: String,
    pub name: String,
    pub schools: Vec<MockSchool>,
}

pub struct MockRegion {
    pub id: String,
    pub name: String,
    pub comunas: Vec<MockComuna>,
}

/// Observations shared with the test after the driver is moved into a crawler
#[derive(Debug, Default)]
pub struct Activity {
    pub quit_calls: usize,
    pub details_loaded: Vec<String>,
    pub searches: Vec<String>,
}

#[derive(Debug, Clone, PartialEq)]
enum Page {
    Blank,
    Search {
        region: Option<usize>,
        comuna: Option<usize>,
    },
    Results {
        region: usize,
        comuna: usize,
    },
    Detail {
        url: String,
        expanded: bool,
    },
}

pub struct MockSite {
    site: SiteConfig,
    regions: Vec<MockRegion>,
    page: Page,
    unreachable: HashSet<String>,
    session_dies_at: Option<String>,
    stop_after: Option<(usize, StopSignal)>,
    failing_regions: HashSet<String>,
    failing_searches: HashSet<String>,
    search_page_down: bool,
    activity: Rc<RefCell<Activity>>,
}

impl MockSite {
    pub fn new(regions: Vec<MockRegion>) -> Self {
        Self {
            site: SiteConfig::default(),
            regions,
            page: Page::Blank,
            unreachable: HashSet::new(),
            session_dies_at: None,
            stop_after: None,
            failing_regions: HashSet::new(),
            failing_searches: HashSet::new(),
            search_page_down: false,
            activity: Rc::new(RefCell::new(Activity::default())),
        }
    }

    /// Detail pages at these codes fail to load
    pub fn with_unreachable(mut self, code: &str) -> Self {
        self.unreachable.insert(self.site.detail_url(code));
        self
    }

    /// The browser session dies when this school's page is requested
    pub fn with_session_dying_at(mut self, code: &str) -> Self {
        self.session_dies_at = Some(self.site.detail_url(code));
        self
    }

    /// Triggers `stop` once this many detail pages have been served
    pub fn with_stop_after(mut self, details: usize, stop: StopSignal) -> Self {
        self.stop_after = Some((details, stop));
        self
    }

    /// Selecting this region never loads its comunas
    pub fn with_failing_region(mut self, region_id: &str) -> Self {
        self.failing_regions.insert(region_id.to_string());
        self
    }

    /// Submitting the search for this comuna never renders results
    pub fn with_failing_search(mut self, comuna_id: &str) -> Self {
        self.failing_searches.insert(comuna_id.to_string());
        self
    }

    /// The search page itself cannot be loaded
    pub fn with_search_page_down(mut self) -> Self {
        self.search_page_down = true;
        self
    }

    pub fn activity(&self) -> Rc<RefCell<Activity>> {
        Rc::clone(&self.activity)
    }

    fn css<'a>(&self, locator: &'a Locator) -> Option<&'a str> {
        match locator {
            Locator::Css(selector) => Some(selector.as_str()),
            Locator::LinkText(_) => None,
        }
    }

    fn ready(&self, locator: &Locator) -> bool {
        let Some(selector) = self.css(locator) else {
            return matches!(self.page, Page::Detail { .. });
        };
        match &self.page {
            Page::Search { comuna, .. } => {
                selector == self.site.region_select
                    || selector == self.site.comuna_select
                    || (selector == self.site.search_button && comuna.is_some())
            }
            Page::Results { .. } => selector == self.site.results_table,
            Page::Detail { .. } => selector == "body",
            Page::Blank => false,
        }
    }

    fn region_options(&self) -> Vec<ElementSnapshot> {
        let mut options = vec![
            option("", "Seleccione región"),
            option("todas", "Todas"),
        ];
        options.extend(self.regions.iter().map(|r| option(&r.id, &r.name)));
        options
    }

    /// Only the "all" option until a region is chosen
    fn comuna_options(&self, region: Option<usize>) -> Vec<ElementSnapshot> {
        let mut options = vec![option("0", "Todas las comunas")];
        if let Some(region) = region {
            options.extend(
                self.regions[region]
                    .comunas
                    .iter()
                    .map(|c| option(&c.id, &c.name)),
            );
        }
        options
    }

    fn result_links(&self, region: usize, comuna: usize) -> Vec<ElementSnapshot> {
        let mut links = Vec::new();
        for school in &self.regions[region].comunas[comuna].schools {
            links.push(ElementSnapshot::new("Ficha").with_attribute(
                "onclick",
                format!(
                    "document.fichaescuela.rbd.value='{}'; document.fichaescuela.submit();",
                    school.code
                ),
            ));
            links.push(
                ElementSnapshot::new("Mapa")
                    .with_attribute("onclick", format!("verMapa('{}')", school.code)),
            );
        }
        links
    }

    fn detail_html(&self, url: &str) -> Option<&str> {
        self.regions
            .iter()
            .flat_map(|r| &r.comunas)
            .flat_map(|c| &c.schools)
            .find(|s| self.site.detail_url(&s.code) == url)
            .map(|s| s.html.as_str())
    }
}

impl DomDriver for MockSite {
    fn navigate(&mut self, url: &str) -> DriverResult<()> {
        if self.session_dies_at.as_deref() == Some(url) {
            return Err(DriverError::SessionClosed);
        }
        if self.unreachable.contains(url) {
            return Err(DriverError::Navigation {
                url: url.to_string(),
                message: "net::ERR_CONNECTION_RESET".to_string(),
            });
        }

        if url == self.site.base_url {
            if self.search_page_down {
                return Err(DriverError::Navigation {
                    url: url.to_string(),
                    message: "net::ERR_NAME_NOT_RESOLVED".to_string(),
                });
            }
            self.page = Page::Search {
                region: None,
                comuna: None,
            };
            return Ok(());
        }

        if self.detail_html(url).is_some() {
            self.page = Page::Detail {
                url: url.to_string(),
                expanded: false,
            };
            let served = {
                let mut activity = self.activity.borrow_mut();
                activity.details_loaded.push(url.to_string());
                activity.details_loaded.len()
            };
            if let Some((limit, stop)) = &self.stop_after {
                if served >= *limit {
                    stop.trigger();
                }
            }
            return Ok(());
        }

        Err(DriverError::Navigation {
            url: url.to_string(),
            message: "404".to_string(),
        })
    }

    fn wait_until(&mut self, locator: &Locator, _readiness: Readiness) -> DriverResult<()> {
        if self.ready(locator) {
            Ok(())
        } else {
            Err(DriverError::Timeout {
                locator: locator.to_string(),
                seconds: 10,
            })
        }
    }

    fn find_elements(
        &mut self,
        locator: &Locator,
        _attributes: &[&str],
    ) -> DriverResult<Vec<ElementSnapshot>> {
        let Some(selector) = self.css(locator) else {
            return Ok(Vec::new());
        };

        let elements = match &self.page {
            Page::Search { .. } if selector == self.site.region_options() => self.region_options(),
            Page::Search { region, .. } if selector == self.site.comuna_options() => {
                self.comuna_options(*region)
            }
            Page::Results { region, comuna } if selector == self.site.result_links => {
                self.result_links(*region, *comuna)
            }
            _ => Vec::new(),
        };
        Ok(elements)
    }

    fn click(&mut self, locator: &Locator) -> DriverResult<()> {
        match (self.page.clone(), locator) {
            (
                Page::Search {
                    region: Some(region),
                    comuna: Some(comuna),
                },
                Locator::Css(selector),
            ) if *selector == self.site.search_button => {
                let target = &self.regions[region].comunas[comuna];
                if self.failing_searches.contains(&target.id) {
                    return Err(DriverError::Timeout {
                        locator: self.site.results_table.clone(),
                        seconds: 10,
                    });
                }
                let name = target.name.clone();
                self.activity.borrow_mut().searches.push(name);
                self.page = Page::Results { region, comuna };
                Ok(())
            }
            (Page::Detail { url, .. }, Locator::LinkText(text))
                if text == "Información institucional" =>
            {
                self.page = Page::Detail {
                    url,
                    expanded: true,
                };
                Ok(())
            }
            _ => Err(DriverError::ElementNotFound {
                locator: locator.to_string(),
            }),
        }
    }

    fn select_option(&mut self, select: &Locator, value: &str) -> DriverResult<()> {
        let not_found = || DriverError::ElementNotFound {
            locator: format!("{} option[value='{}']", select, value),
        };
        let selector = self.css(select).ok_or_else(not_found)?.to_string();

        match self.page.clone() {
            Page::Search { .. } if selector == self.site.region_select => {
                if self.failing_regions.contains(value) {
                    return Err(DriverError::Timeout {
                        locator: self.site.comuna_select.clone(),
                        seconds: 10,
                    });
                }
                let region = self
                    .regions
                    .iter()
                    .position(|r| r.id == value)
                    .ok_or_else(not_found)?;
                self.page = Page::Search {
                    region: Some(region),
                    comuna: None,
                };
                Ok(())
            }
            Page::Search {
                region: Some(region),
                ..
            } if selector == self.site.comuna_select => {
                let comuna = self.regions[region]
                    .comunas
                    .iter()
                    .position(|c| c.id == value)
                    .ok_or_else(not_found)?;
                self.page = Page::Search {
                    region: Some(region),
                    comuna: Some(comuna),
                };
                Ok(())
            }
            _ => Err(not_found()),
        }
    }

    fn page_source(&mut self) -> DriverResult<String> {
        match &self.page {
            Page::Detail { url, expanded } => {
                let html = self.detail_html(url).unwrap_or_default();
                if *expanded {
                    Ok(html.to_string())
                } else {
                    // The institutional section only renders once opened
                    Ok(strip_between(html, "<!--institutional-->", "<!--/institutional-->"))
                }
            }
            _ => Ok("<html><body></body></html>".to_string()),
        }
    }

    fn quit(&mut self) -> DriverResult<()> {
        self.activity.borrow_mut().quit_calls += 1;
        self.page = Page::Blank;
        Ok(())
    }
}

fn option(value: &str, text: &str) -> ElementSnapshot {
    ElementSnapshot::new(text).with_attribute("value", value)
}

fn strip_between(html: &str, start: &str, end: &str) -> String {
    match (html.find(start), html.find(end)) {
        (Some(s), Some(e)) if e > s => format!("{}{}", &html[..s], &html[e + end.len()..]),
        _ => html.to_string(),
    }
}

/// Detail page with the enrollment in the institutional section's div layout
pub fn school_page(name: &str, phone: &str, enrollment: &str) -> String {
    format!(
        r#"<html><body>
        <div class="titulo_color"><table><tr><td>{name}</td></tr></table></div>
        <table>
            <tr><td>Dirección:</td><td>Av. Principal 123</td></tr>
            <tr><td>Teléfono:</td><td>{phone}</td></tr>
            <tr><td>E-mail contacto:</td><td>contacto@colegio.cl</td></tr>
            <tr><td>Director(a):</td><td>María Pérez</td></tr>
            <tr><td>Sostenedor:</td><td>Municipalidad</td></tr>
        </table>
        <a href="javascript:void(0)">Información institucional</a>
        <!--institutional-->
        <div class="institucional">
            <div>Matrícula total de alumnos:</div>
            <div class="form_detalle">{enrollment}</div>
        </div>
        <!--/institutional-->
        </body></html>"#
    )
}

/// Detail page whose enrollment appears only as a table cell pair
pub fn school_page_with_cell_enrollment(name: &str, enrollment: &str) -> String {
    format!(
        r#"<html><body>
        <div class="titulo_color"><table><tr><td>{name}</td></tr></table></div>
        <!--institutional-->
        <table><tr><td>Matrícula total de alumnos:</td><td>{enrollment}</td></tr></table>
        <!--/institutional-->
        </body></html>"#
    )
}

pub fn school(code: &str) -> MockSchool {
    MockSchool {
        code: code.to_string(),
        html: school_page(&format!("Escuela {}", code), "+56 2 2345 6789", "420"),
    }
}

pub fn comuna<S: AsRef<str>>(id: &str, name: &str, codes: &[S]) -> MockComuna {
    MockComuna {
        id: id.to_string(),
        name: name.to_string(),
        schools: codes.iter().map(|code| school(code.as_ref())).collect(),
    }
}

pub fn region(id: &str, name: &str, comunas: Vec<MockComuna>) -> MockRegion {
    MockRegion {
        id: id.to_string(),
        name: name.to_string(),
        comunas,
    }
}

/// Sequential codes, e.g. `codes(100, 3)` is 100, 101, 102
pub fn codes(start: usize, count: usize) -> Vec<String> {
    (start..start + count).map(|n| n.to_string()).collect()
}

/// Default configuration with every output path inside `dir`
pub fn test_config(dir: &Path) -> Config {
    let path = |name: &str| dir.join(name).display().to_string();
    Config {
        output: OutputConfig {
            checkpoint_path: path("progress.json"),
            export_path: path("colegios_chile.csv"),
            intermediate_export_path: path("colegios_chile_intermediate.csv"),
            pilot_export_path: path("colegios_piloto.csv"),
            log_path: path("harvest.log"),
        },
        ..Config::default()
    }
}

pub fn checkpoint_path(config: &Config) -> PathBuf {
    PathBuf::from(&config.output.checkpoint_path)
}

/// Checkpoint store that records the `recordsCollected` of every save
pub struct RecordingStore {
    inner: JsonCheckpointStore,
    pub saves: Rc<RefCell<Vec<usize>>>,
}

impl RecordingStore {
    pub fn new(config: &Config) -> Self {
        Self {
            inner: JsonCheckpointStore::new(&config.output.checkpoint_path),
            saves: Rc::new(RefCell::new(Vec::new())),
        }
    }
}

impl CheckpointStore for RecordingStore {
    fn save(&mut self, cursor: &CrawlCursor) -> CheckpointResult<()> {
        self.saves.borrow_mut().push(cursor.records_collected);
        self.inner.save(cursor)
    }

    fn load(&self, path: &Path) -> CheckpointResult<Option<CrawlCursor>> {
        self.inner.load(path)
    }

    fn location(&self) -> &Path {
        self.inner.location()
    }
}

/// Record sink that records the kind and size of every export
pub struct RecordingSink {
    inner: CsvRecordSink,
    pub exports: Rc<RefCell<Vec<(ExportKind, usize)>>>,
}

impl RecordingSink {
    pub fn new(config: &Config) -> Self {
        Self {
            inner: CsvRecordSink::from_config(&config.output),
            exports: Rc::new(RefCell::new(Vec::new())),
        }
    }
}

impl RecordSink for RecordingSink {
    fn export(
        &mut self,
        records: &[SchoolRecord],
        kind: ExportKind,
    ) -> OutputResult<Option<PathBuf>> {
        self.exports.borrow_mut().push((kind, records.len()));
        self.inner.export(records, kind)
    }

    fn restore(&self, kind: ExportKind) -> OutputResult<Vec<SchoolRecord>> {
        self.inner.restore(kind)
    }
}
