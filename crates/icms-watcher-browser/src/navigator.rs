//! Page-by-page navigation from the portal start page to the grade table.

use std::fmt;

use tracing::{info, warn};

use crate::locate::{find_first, normalize_whitespace};
use crate::{BrowserError, CandidateList, Driver, Element, Locator, Readiness, WaitStrategy};

pub const DEFAULT_PORTAL_URL: &str = "https://campusmanagement.hs-hannover.de/qisserver";
pub const DEFAULT_ROLE_LABEL: &str = "Student/-in Hochschule Hannover";
pub const DEFAULT_PROGRAM: &str = "90 Master";

/// Where things are on the portal.
#[derive(Debug, Clone)]
pub struct PortalLayout {
    pub start_url: String,
    /// Portal page hosting the legacy "my functions" frame.
    pub functions_url: String,
    pub login_button: Locator,
    pub username_field: Locator,
    pub password_field: Locator,
    pub role_selector: Locator,
    pub role_options: Locator,
    pub frame_marker: Locator,
    pub content_frame: String,
    pub exams_link: CandidateList,
    pub grades_link: CandidateList,
    pub grade_table: Locator,
    /// Rows relative to `grade_table`.
    pub row: Locator,
    /// Cells relative to a row.
    pub cell: Locator,
}

impl Default for PortalLayout {
    fn default() -> Self {
        Self::with_base_url(DEFAULT_PORTAL_URL)
    }
}

impl PortalLayout {
    /// The HsH layout served from `base_url` (the `qisserver` root).
    pub fn with_base_url(base_url: &str) -> Self {
        let base = base_url.trim_end_matches('/');
        Self {
            start_url: format!("{base}/pages/cs/sys/portal/hisinoneStartPage.faces"),
            functions_url: format!(
                "{base}/pages/cs/sys/portal/hisinoneIframePage.faces\
                 ?id=qis_meine_funktionen&navigationPosition=hisinoneMeinStudium"
            ),
            login_button: Locator::xpath(r#"//*[@id="loginForm:login"]"#),
            username_field: Locator::xpath(r#"//*[@id="asdf"]"#),
            password_field: Locator::xpath(r#"//*[@id="fdsa"]"#),
            role_selector: Locator::id("widgetRender:9:roleSwitcherForm:roles_label"),
            role_options: Locator::xpath("//li[contains(@class, 'ui-selectonemenu-item')]"),
            frame_marker: Locator::tag("iframe"),
            content_frame: "frame_iframe_qis_meine_funktionen".into(),
            exams_link: CandidateList::new(["Prüfungen", "Exams"]),
            grades_link: CandidateList::new(["Notenspiegel", "Transcript of Records"]),
            grade_table: Locator::xpath("/html/body/div/div[2]/div[2]/form/table[2]/tbody"),
            row: Locator::xpath("tr"),
            cell: Locator::xpath("td"),
        }
    }

    /// The "show" icon next to a degree program on the grade overview.
    pub fn show_icon(&self, program: &str) -> Locator {
        Locator::xpath(format!(
            r#"//*[@title="Leistungen für Abschluss {program} anzeigen"]"#
        ))
    }
}

pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// One page transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Step {
    OpenStartPage,
    SubmitLogin,
    /// Select the role whose label contains this text.
    PinRole(String),
    EnterContentFrame,
    OpenExams,
    OpenGradeOverview,
    ShowProgram(String),
}

impl Step {
    /// The transitions from the start page to a program's grade table.
    ///
    /// Role pinning is only needed for accounts holding more than one role.
    pub fn plan(pin_role: Option<&str>, program: &str) -> Vec<Step> {
        let mut steps = vec![Step::OpenStartPage, Step::SubmitLogin];
        if let Some(role) = pin_role {
            steps.push(Step::PinRole(role.to_string()));
        }
        steps.extend([
            Step::EnterContentFrame,
            Step::OpenExams,
            Step::OpenGradeOverview,
            Step::ShowProgram(program.to_string()),
        ]);
        steps
    }
}

pub struct Navigator<'a, D> {
    driver: &'a D,
    layout: &'a PortalLayout,
    wait: WaitStrategy,
}

impl<'a, D: Driver> Navigator<'a, D> {
    pub fn new(driver: &'a D, layout: &'a PortalLayout, wait: WaitStrategy) -> Self {
        Self {
            driver,
            layout,
            wait,
        }
    }

    /// Execute `steps` in order, stopping at the first failure.
    pub async fn run(&self, steps: &[Step], credentials: &Credentials) -> Result<(), BrowserError> {
        for step in steps {
            info!(?step, "navigating");
            self.execute(step, credentials).await?;
        }
        Ok(())
    }

    async fn execute(&self, step: &Step, credentials: &Credentials) -> Result<(), BrowserError> {
        let layout = self.layout;
        match step {
            Step::OpenStartPage => self.driver.navigate(&layout.start_url).await,
            Step::SubmitLogin => self.login(credentials).await,
            Step::PinRole(label) => self.pin_role(label).await,
            Step::EnterContentFrame => {
                self.driver.navigate(&layout.functions_url).await?;
                self.wait
                    .await_condition(self.driver, &layout.frame_marker, Readiness::Present)
                    .await?;
                self.driver.switch_frame(&layout.content_frame).await
            }
            Step::OpenExams => self.click_any(&layout.exams_link).await,
            Step::OpenGradeOverview => self.click_any(&layout.grades_link).await,
            Step::ShowProgram(program) => {
                self.wait
                    .await_condition(self.driver, &layout.show_icon(program), Readiness::Clickable)
                    .await?
                    .click()
                    .await
            }
        }
    }

    async fn login(&self, credentials: &Credentials) -> Result<(), BrowserError> {
        let layout = self.layout;
        let submit = self
            .wait
            .await_condition(self.driver, &layout.login_button, Readiness::Clickable)
            .await?;
        let username = self.require(&layout.username_field).await?;
        let password = self.require(&layout.password_field).await?;

        username.send_keys(&credentials.username).await?;
        password.clear().await?;
        password.send_keys(&credentials.password).await?;

        let url_before = self.driver.current_url().await?;
        submit.click().await?;
        self.wait
            .await_login(self.driver, &url_before, &layout.login_button)
            .await;
        Ok(())
    }

    async fn pin_role(&self, label: &str) -> Result<(), BrowserError> {
        let layout = self.layout;
        self.wait
            .await_condition(self.driver, &layout.role_selector, Readiness::Clickable)
            .await?
            .click()
            .await?;

        let wanted = normalize_whitespace(label);
        let driver = self.driver;
        let options = &layout.role_options;
        let wanted_ref = wanted.as_str();
        let option = self
            .wait
            .poll(&format!("role option {wanted:?}"), self.wait.timeout, move || async move {
                for option in driver.find_all(options).await? {
                    if option.is_displayed().await.unwrap_or(false)
                        && normalize_whitespace(&option.text().await?).contains(wanted_ref)
                    {
                        return Ok(Some(option));
                    }
                }
                Ok::<_, BrowserError>(None)
            })
            .await
            .map_err(|e| match e {
                BrowserError::Timeout { .. } => BrowserError::TargetNotFound {
                    candidates: vec![wanted.clone()],
                },
                other => other,
            })?;

        let url_before = self.driver.current_url().await?;
        option.click().await?;
        self.wait
            .await_login(self.driver, &url_before, &layout.login_button)
            .await;
        Ok(())
    }

    /// Wait for any of `candidates` to show up as a link and click it.
    async fn click_any(&self, candidates: &CandidateList) -> Result<(), BrowserError> {
        let driver = self.driver;
        let probe = format!("any of {:?}", candidates.names());
        let (link, name) = self
            .wait
            .poll(&probe, self.wait.timeout, move || {
                find_first(driver, candidates, |n| Locator::partial_link_text(n))
            })
            .await
            .map_err(|e| match e {
                BrowserError::Timeout { .. } => candidates.target_not_found(),
                other => other,
            })?;
        info!(candidate = name, "found link");
        self.wait.settle(driver).await;
        link.click().await
    }

    async fn require(&self, locator: &Locator) -> Result<D::Element, BrowserError> {
        self.driver
            .find(locator)
            .await?
            .ok_or_else(|| BrowserError::TargetNotFound {
                candidates: vec![locator.to_string()],
            })
    }

    /// Read the grade table as rows of cell texts, header and summary included.
    pub async fn read_grade_table(&self) -> Result<Vec<Vec<String>>, BrowserError> {
        let layout = self.layout;
        let body = self
            .wait
            .await_condition(self.driver, &layout.grade_table, Readiness::Present)
            .await?;

        let rows = body.find_all(&layout.row).await?;
        if rows.is_empty() {
            warn!("grade table body has no rows");
        }

        let mut table = Vec::with_capacity(rows.len());
        for row in rows {
            let mut texts = Vec::new();
            for cell in row.find_all(&layout.cell).await? {
                texts.push(cell.text().await?);
            }
            table.push(texts);
        }
        info!(rows = table.len(), "read grade table");
        Ok(table)
    }
}
