use mcbc_core::{version, CoreError, FooterSettings, ReplyTemplates, TemplateRecord};
use std::sync::Mutex;

pub struct ReplyComposer {
    footer: String,
    rng: Mutex<fastrand::Rng>,
}

impl ReplyComposer {
    pub fn new(footer: &FooterSettings) -> Self {
        Self::with_rng(footer, fastrand::Rng::new())
    }

    /// A composer whose template picks are reproducible.
    pub fn with_seed(footer: &FooterSettings, seed: u64) -> Self {
        Self::with_rng(footer, fastrand::Rng::with_seed(seed))
    }

    fn with_rng(footer: &FooterSettings, rng: fastrand::Rng) -> Self {
        Self {
            footer: footer_line(footer, &version::loose_version()),
            rng: Mutex::new(rng),
        }
    }

    /// Pick one template uniformly at random and render it.
    pub fn compose(&self, templates: &ReplyTemplates) -> Result<String, CoreError> {
        if templates.is_empty() {
            return Err(CoreError::InvalidInput {
                message: "no reply templates loaded".to_string(),
            });
        }

        let index = self
            .rng
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .usize(..templates.len());
        let (quote, record) = templates
            .iter()
            .nth(index)
            .ok_or_else(|| CoreError::Internal {
                message: format!("template index {index} out of range"),
            })?;

        Ok(self.render(quote, record))
    }

    pub fn render(&self, quote: &str, record: &TemplateRecord) -> String {
        format!(
            "{}\n\n*{}* to *{}*\n\n{}\n\n---\n\n{}",
            quote.to_uppercase(),
            record.actor,
            record.target,
            record.context,
            self.footer
        )
    }
}

fn footer_line(footer: &FooterSettings, loose_version: &str) -> String {
    format!(
        "[Source]({}) | [Opt-out]({}) | [Contact]({}) | v{}",
        footer.source_url, footer.opt_out_url, footer.contact_url, loose_version
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn templates(entries: &[(&str, &str, &str, &str)]) -> ReplyTemplates {
        entries
            .iter()
            .map(|(quote, actor, target, context)| {
                (
                    quote.to_string(),
                    TemplateRecord {
                        actor: actor.to_string(),
                        target: target.to_string(),
                        context: context.to_string(),
                    },
                )
            })
            .collect()
    }

    #[test]
    fn test_single_template_layout() {
        let composer = ReplyComposer::new(&FooterSettings::default());
        let reply = composer
            .compose(&templates(&[("duck", "Bowler", "Batter", "Out for nought")]))
            .unwrap();

        let duck = reply.find("DUCK").unwrap();
        let pairing = reply.find("*Bowler* to *Batter*").unwrap();
        let context = reply.find("Out for nought").unwrap();
        assert!(duck < pairing && pairing < context);
        assert!(reply.starts_with("DUCK\n\n*Bowler* to *Batter*\n\nOut for nought\n\n---\n\n"));
        assert!(reply.ends_with(&format!("| v{}", version::loose_version())));
    }

    #[test]
    fn test_footer_links() {
        let footer = FooterSettings {
            source_url: "https://example.com/src".to_string(),
            opt_out_url: "https://example.com/optout".to_string(),
            contact_url: "https://example.com/contact".to_string(),
        };
        let composer = ReplyComposer::new(&footer);
        let reply = composer
            .compose(&templates(&[("six", "Batter", "Bowler", "Into the stands")]))
            .unwrap();

        assert!(reply.ends_with(
            "[Source](https://example.com/src) | [Opt-out](https://example.com/optout) | \
             [Contact](https://example.com/contact) | v1.0-a0"
        ));
    }

    #[test]
    fn test_seeded_picks_are_reproducible() {
        let set = templates(&[
            ("duck", "Bowler", "Batter", "Out for nought"),
            ("six", "Batter", "Bowler", "Into the stands"),
            ("yorker", "Bowler", "Batter", "Right at the toes"),
        ]);

        let first = ReplyComposer::with_seed(&FooterSettings::default(), 42);
        let second = ReplyComposer::with_seed(&FooterSettings::default(), 42);
        for _ in 0..10 {
            assert_eq!(first.compose(&set).unwrap(), second.compose(&set).unwrap());
        }
    }

    #[test]
    fn test_every_template_can_be_picked() {
        let set = templates(&[
            ("duck", "Bowler", "Batter", "Out for nought"),
            ("six", "Batter", "Bowler", "Into the stands"),
        ]);
        let composer = ReplyComposer::with_seed(&FooterSettings::default(), 7);

        let replies: Vec<String> = (0..64).map(|_| composer.compose(&set).unwrap()).collect();
        assert!(replies.iter().any(|r| r.starts_with("DUCK")));
        assert!(replies.iter().any(|r| r.starts_with("SIX")));
    }

    #[test]
    fn test_empty_templates_rejected() {
        let composer = ReplyComposer::new(&FooterSettings::default());
        assert!(composer.compose(&ReplyTemplates::new()).is_err());
    }
}
