use anyhow::{anyhow, bail, Context, Result};
use fleeting_common::{PasteId, Url, PASTES_PATH, SHARE_PATH};

/// A paste on a particular server, resolved from either a share link or a
/// bare id plus `--server`.
#[derive(Debug, PartialEq, Eq)]
pub struct Target {
    pub server: Url,
    pub id: PasteId,
}

impl Target {
    pub fn resolve(paste: &str, server: Option<Url>) -> Result<Self> {
        if let Ok(id) = paste.parse::<PasteId>() {
            let server = server.context("A bare paste id needs --server")?;
            return Ok(Self { server, id });
        }

        let link = Url::parse(paste).context("Expected a share link or a paste id")?;
        let mut segments = link
            .path_segments()
            .ok_or_else(|| anyhow!("Share link has no path"))?
            .filter(|s| !s.is_empty());
        let id = match (segments.next_back(), segments.next_back()) {
            (Some(id), Some(prefix)) if prefix == SHARE_PATH.trim_start_matches('/') => id,
            _ => bail!("Not a share link: {}", link),
        };

        let mut base = link.clone();
        base.set_path("");
        base.set_query(None);
        base.set_fragment(None);

        Ok(Self {
            server: server.unwrap_or(base),
            id: id.parse().context("Share link carries an invalid paste id")?,
        })
    }

    pub fn api_url(&self) -> Result<Url> {
        self.endpoint(&format!("{PASTES_PATH}/{}", self.id))
    }

    pub fn availability_url(&self) -> Result<Url> {
        self.endpoint(&format!("{PASTES_PATH}/{}/availability", self.id))
    }

    fn endpoint(&self, path: &str) -> Result<Url> {
        self.server
            .join(path)
            .with_context(|| format!("Bad server url {}", self.server))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ID: &str = "67e55044-10b1-426f-9247-bb680e5fe0c8";

    #[test]
    fn resolves_share_link() {
        let target = Target::resolve(&format!("https://paste.example.com/p/{ID}"), None).unwrap();

        assert_eq!(target.server.as_str(), "https://paste.example.com/");
        assert_eq!(target.id.to_string(), ID);
        assert_eq!(
            target.api_url().unwrap().as_str(),
            format!("https://paste.example.com/api/pastes/{ID}")
        );
    }

    #[test]
    fn explicit_server_wins_over_link_host() {
        let server: Url = "http://localhost:8080".parse().unwrap();
        let target =
            Target::resolve(&format!("https://paste.example.com/p/{ID}"), Some(server.clone()))
                .unwrap();
        assert_eq!(target.server, server);
    }

    #[test]
    fn bare_id_needs_server() {
        assert!(Target::resolve(ID, None).is_err());

        let target = Target::resolve(ID, Some("http://localhost:8080".parse().unwrap())).unwrap();
        assert_eq!(
            target.availability_url().unwrap().as_str(),
            format!("http://localhost:8080/api/pastes/{ID}/availability")
        );
    }

    #[test]
    fn rejects_links_without_an_id() {
        assert!(Target::resolve("https://paste.example.com/", None).is_err());
        assert!(Target::resolve("https://paste.example.com/p/nope", None).is_err());
        assert!(Target::resolve(&format!("https://paste.example.com/x/{ID}"), None).is_err());
    }
}
