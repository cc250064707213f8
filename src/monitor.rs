use std::sync::Arc;

use arc_swap::ArcSwap;

use tokio::time;

use tokio_util::sync::CancellationToken;

use crate::probe::{Probe, ProbeOutcome};
use crate::settings::DoujinSettings;

#[derive(Debug, Clone, Default)]
pub struct ProxyList(Arc<ArcSwap<Vec<String>>>);

impl ProxyList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> Arc<Vec<String>> {
        self.0.load_full()
    }

    pub fn len(&self) -> usize {
        self.0.load().len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.load().is_empty()
    }

    fn publish(&self, proxies: Vec<String>) -> Arc<Vec<String>> {
        let proxies = Arc::new(proxies);
        self.0.store(proxies.clone());
        proxies
    }
}

pub struct ProxyHealthMonitor<P> {
    settings: DoujinSettings,
    probe: P,
    proxies: ProxyList,
}

impl<P: Probe + 'static> ProxyHealthMonitor<P> {
    pub fn new(settings: DoujinSettings, probe: P) -> Self {
        Self {
            settings,
            probe,
            proxies: ProxyList::new(),
        }
    }

    pub fn proxies(&self) -> ProxyList {
        self.proxies.clone()
    }

    pub fn spawn(self, token: CancellationToken) -> actix_rt::task::JoinHandle<()> {
        actix_rt::spawn(self.run(token))
    }

    pub async fn run(self, token: CancellationToken) {
        let interval = self.settings.proxy_check_interval();

        log::info!(
            "proxy monitor started: {} candidates, checking every {:?}",
            self.settings.download_proxies.len(),
            interval
        );

        loop {
            if let Some(proxies) = self.check_once(&token).await {
                log::info!(
                    "{} of {} proxies online",
                    proxies.len(),
                    self.settings.target_proxy_count()
                );
            }

            tokio::select! {
                _ = token.cancelled() => break,
                _ = time::sleep(interval) => {}
            }
        }

        log::info!("proxy monitor stopped");
    }

    /// Performs one pass and publishes its result.
    ///
    /// Returns `None` without touching the published list if `token` is
    /// cancelled before the pass completes.
    pub async fn check_once(&self, token: &CancellationToken) -> Option<Arc<Vec<String>>> {
        let target = self.settings.target_proxy_count();
        let attempts = self.settings.proxy_check_attempts.max(1);

        let mut accepted = Vec::with_capacity(target);

        for candidate in &self.settings.download_proxies {
            if accepted.len() >= target {
                break;
            }

            if self.check_candidate(candidate, attempts, token).await? {
                accepted.push(candidate.clone());
            } else {
                log::warn!(
                    "skipping proxy '{}' after {} failed attempts",
                    candidate,
                    attempts
                );
            }
        }

        Some(self.proxies.publish(accepted))
    }

    async fn check_candidate(
        &self,
        candidate: &str,
        attempts: u32,
        token: &CancellationToken,
    ) -> Option<bool> {
        for attempt in 1..=attempts {
            if token.is_cancelled() {
                return None;
            }

            match self.probe.probe(candidate, token).await {
                ProbeOutcome::Healthy(_) => return Some(true),
                ProbeOutcome::Unhealthy(status) => {
                    log::debug!(
                        "proxy '{}' responded {} (attempt {}/{})",
                        candidate,
                        status,
                        attempt,
                        attempts
                    );
                }
                ProbeOutcome::Failed(e) => {
                    log::warn!(
                        "error while contacting proxy '{}' (attempt {}/{}): {}",
                        candidate,
                        attempt,
                        attempts,
                        e
                    );
                }
                ProbeOutcome::Cancelled => return None,
            }
        }

        Some(false)
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::collections::{HashMap, VecDeque};
    use std::time::Duration;

    use async_trait::async_trait;
    use awc::error::SendRequestError;
    use awc::http::StatusCode;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;
    use crate::probe::AwcProbe;

    #[derive(Debug, Clone, Copy)]
    enum Step {
        Ok,
        ServerError,
        TimedOut,
    }

    impl Step {
        fn outcome(self) -> ProbeOutcome {
            match self {
                Step::Ok => ProbeOutcome::Healthy(StatusCode::OK),
                Step::ServerError => ProbeOutcome::Unhealthy(StatusCode::INTERNAL_SERVER_ERROR),
                Step::TimedOut => ProbeOutcome::Failed(SendRequestError::Timeout),
            }
        }
    }

    /// Answers from a per-url script, repeating the last entry once exhausted.
    #[derive(Default)]
    struct ScriptedProbe {
        script: RefCell<HashMap<String, VecDeque<Step>>>,
        calls: RefCell<Vec<String>>,
        cancel_on: Option<(String, CancellationToken)>,
    }

    impl ScriptedProbe {
        fn with(mut self, url: &str, steps: Vec<Step>) -> Self {
            self.script
                .get_mut()
                .insert(url.to_string(), steps.into_iter().collect());
            self
        }

        fn calls_to(&self, url: &str) -> usize {
            self.calls.borrow().iter().filter(|c| *c == url).count()
        }
    }

    #[async_trait(?Send)]
    impl Probe for ScriptedProbe {
        async fn probe(&self, url: &str, _token: &CancellationToken) -> ProbeOutcome {
            self.calls.borrow_mut().push(url.to_string());

            if let Some((trigger, token)) = &self.cancel_on {
                if trigger == url {
                    token.cancel();
                    return ProbeOutcome::Cancelled;
                }
            }

            let mut script = self.script.borrow_mut();
            let step = match script.get_mut(url) {
                Some(steps) if steps.len() > 1 => steps.pop_front().unwrap(),
                Some(steps) => *steps.front().unwrap(),
                None => Step::Ok,
            };

            step.outcome()
        }
    }

    fn settings(proxies: &[&str], max: Option<u32>) -> DoujinSettings {
        DoujinSettings {
            download_proxies: proxies.iter().map(|p| p.to_string()).collect(),
            max_concurrent_proxies: max,
            ..Default::default()
        }
    }

    #[actix_rt::test]
    async fn publishes_up_to_max() {
        let monitor =
            ProxyHealthMonitor::new(settings(&["A", "B", "C"], Some(2)), ScriptedProbe::default());

        let result = monitor.check_once(&CancellationToken::new()).await.unwrap();

        assert_eq!(*result, vec!["A", "B"]);
        assert_eq!(*monitor.proxies().snapshot(), vec!["A", "B"]);
        assert_eq!(monitor.probe.calls_to("C"), 0);
    }

    #[actix_rt::test]
    async fn publishes_all_without_max() {
        let monitor =
            ProxyHealthMonitor::new(settings(&["A", "B", "C"], None), ScriptedProbe::default());

        monitor.check_once(&CancellationToken::new()).await.unwrap();

        assert_eq!(*monitor.proxies().snapshot(), vec!["A", "B", "C"]);
    }

    #[actix_rt::test]
    async fn zero_max_publishes_nothing() {
        let monitor =
            ProxyHealthMonitor::new(settings(&["A", "B"], Some(0)), ScriptedProbe::default());

        monitor.check_once(&CancellationToken::new()).await.unwrap();

        assert!(monitor.proxies().is_empty());
        assert!(monitor.probe.calls.borrow().is_empty());
    }

    #[actix_rt::test]
    async fn persistently_failing_candidate_is_skipped() {
        let probe = ScriptedProbe::default().with("B", vec![Step::ServerError]);
        let monitor = ProxyHealthMonitor::new(settings(&["A", "B", "C"], Some(2)), probe);

        monitor.check_once(&CancellationToken::new()).await.unwrap();

        assert_eq!(*monitor.proxies().snapshot(), vec!["A", "C"]);
        assert_eq!(monitor.probe.calls_to("B"), 3);
    }

    #[actix_rt::test]
    async fn failing_candidate_is_retried_until_it_answers() {
        let probe = ScriptedProbe::default()
            .with("A", vec![Step::TimedOut, Step::ServerError, Step::Ok]);
        let monitor = ProxyHealthMonitor::new(settings(&["A", "B"], Some(1)), probe);

        monitor.check_once(&CancellationToken::new()).await.unwrap();

        assert_eq!(*monitor.proxies().snapshot(), vec!["A"]);
        assert_eq!(monitor.probe.calls_to("A"), 3);
        assert_eq!(monitor.probe.calls_to("B"), 0);
    }

    #[actix_rt::test]
    async fn short_result_when_candidates_run_out() {
        let probe = ScriptedProbe::default()
            .with("A", vec![Step::TimedOut])
            .with("C", vec![Step::ServerError]);
        let monitor = ProxyHealthMonitor::new(settings(&["A", "B", "C"], Some(2)), probe);

        monitor.check_once(&CancellationToken::new()).await.unwrap();

        assert_eq!(*monitor.proxies().snapshot(), vec!["B"]);
    }

    #[actix_rt::test]
    async fn cancelled_pass_keeps_previous_snapshot() {
        let token = CancellationToken::new();
        let monitor = ProxyHealthMonitor::new(
            settings(&["A", "B", "C"], None),
            ScriptedProbe::default(),
        );
        monitor.check_once(&token).await.unwrap();
        let before = monitor.proxies().snapshot();

        let monitor = ProxyHealthMonitor {
            probe: ScriptedProbe {
                cancel_on: Some(("B".into(), token.clone())),
                ..Default::default()
            },
            ..monitor
        };

        assert!(monitor.check_once(&token).await.is_none());
        assert!(Arc::ptr_eq(&before, &monitor.proxies().snapshot()));
        assert_eq!(monitor.probe.calls_to("C"), 0);
    }

    #[actix_rt::test]
    async fn readers_see_whole_snapshots() {
        let monitor =
            ProxyHealthMonitor::new(settings(&["A", "B"], None), ScriptedProbe::default());
        let reader = monitor.proxies();

        assert!(reader.snapshot().is_empty());

        monitor.check_once(&CancellationToken::new()).await.unwrap();

        assert_eq!(reader.len(), 2);
        assert_eq!(*reader.snapshot(), vec!["A", "B"]);
    }

    #[actix_rt::test]
    async fn cancellation_interrupts_sleep() {
        let mut settings = settings(&["A"], None);
        settings.proxy_check_interval = 60.0;

        let monitor = ProxyHealthMonitor::new(settings, ScriptedProbe::default());
        let proxies = monitor.proxies();
        let token = CancellationToken::new();
        let handle = monitor.spawn(token.clone());

        while proxies.is_empty() {
            time::sleep(Duration::from_millis(5)).await;
        }

        token.cancel();

        time::timeout(Duration::from_secs(1), handle)
            .await
            .expect("monitor did not stop")
            .unwrap();
        assert_eq!(*proxies.snapshot(), vec!["A"]);
    }

    #[actix_rt::test]
    async fn cancellation_abandons_pass_in_flight() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(5)))
            .mount(&server)
            .await;

        let settings = DoujinSettings {
            download_proxies: vec![server.uri()],
            proxy_request_timeout: 30.0,
            ..Default::default()
        };

        let probe = AwcProbe::new(settings.proxy_request_timeout(), 1);
        let monitor = ProxyHealthMonitor::new(settings, probe);
        let proxies = monitor.proxies();
        let token = CancellationToken::new();
        let handle = monitor.spawn(token.clone());

        time::sleep(Duration::from_millis(100)).await;
        token.cancel();

        time::timeout(Duration::from_millis(500), handle)
            .await
            .expect("monitor did not stop")
            .unwrap();
        assert!(proxies.is_empty());
    }

    #[actix_rt::test]
    async fn checks_real_endpoints() {
        let server = MockServer::start().await;
        for (route, status) in [("/a", 200), ("/b", 500), ("/c", 200)] {
            Mock::given(method("GET"))
                .and(path(route))
                .respond_with(ResponseTemplate::new(status))
                .mount(&server)
                .await;
        }

        let urls: Vec<String> = ["/a", "/b", "/c"]
            .iter()
            .map(|route| format!("{}{}", server.uri(), route))
            .collect();
        let settings = DoujinSettings {
            download_proxies: urls.clone(),
            max_concurrent_proxies: Some(2),
            proxy_request_timeout: 1.0,
            ..Default::default()
        };

        let probe = AwcProbe::new(settings.proxy_request_timeout(), 2);
        let monitor = ProxyHealthMonitor::new(settings, probe);

        monitor.check_once(&CancellationToken::new()).await.unwrap();

        assert_eq!(
            *monitor.proxies().snapshot(),
            vec![urls[0].clone(), urls[2].clone()]
        );
    }
}
