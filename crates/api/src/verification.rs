//! Contributor qualification: CV keywords and public GitHub languages per role.
//!
//! Roles without a profile accept any CV and any GitHub account with public repositories.

use std::collections::BTreeSet;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RoleProfile {
  pub role: &'static str,
  /// Every keyword must appear in the CV.
  pub skills: &'static [&'static str],
  /// At least one repository must use one of these languages.
  pub languages: &'static [&'static str],
}

const PROFILES: &[RoleProfile] = &[
  RoleProfile {
    role: "Frontend Developer",
    skills: &["react", "javascript", "css", "html"],
    languages: &["JavaScript", "TypeScript", "HTML", "CSS", "Vue", "Svelte"],
  },
  RoleProfile {
    role: "Backend Developer",
    skills: &["node", "express", "django", "flask", "api", "database"],
    languages: &["Go", "Python", "JavaScript", "TypeScript", "Java", "Rust", "Ruby", "PHP", "C#"],
  },
  RoleProfile {
    role: "UI/UX Designer",
    skills: &["figma", "adobe", "sketch", "wireframe", "prototype"],
    languages: &["CSS", "HTML"],
  },
];

pub fn role_profile(role: &str) -> Option<&'static RoleProfile> {
  let role = role.trim();
  PROFILES.iter().find(|profile| profile.role.eq_ignore_ascii_case(role))
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CvCheck {
  pub qualified: bool,
  pub found: Vec<String>,
  pub missing: Vec<String>,
}

pub fn check_cv(cv_text: &str, role: &str) -> CvCheck {
  let Some(profile) = role_profile(role) else {
    return CvCheck {
      qualified: !cv_text.trim().is_empty(),
      found: vec![],
      missing: vec![],
    };
  };

  let text = cv_text.to_lowercase();
  let (found, missing): (Vec<&str>, Vec<&str>) = profile.skills.iter().copied().partition(|skill| text.contains(*skill));

  CvCheck {
    qualified: missing.is_empty(),
    found: found.into_iter().map(str::to_owned).collect(),
    missing: missing.into_iter().map(str::to_owned).collect(),
  }
}

/// Accepts a profile URL, `@name` or a bare user name.
pub fn github_username(input: &str) -> Option<String> {
  let input = input.trim();
  let name = match input.find("github.com/") {
    Some(index) => input[index + "github.com/".len()..].split(['/', '?', '#']).next().unwrap_or_default(),
    None => input.trim_start_matches('@'),
  };

  let valid = !name.is_empty() && name.len() <= 39 && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '-');

  valid.then(|| name.to_string())
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepoLanguages {
  pub name: String,
  pub languages: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GithubCheck {
  pub qualified: bool,
  /// Languages that count for the role, or every language seen for roles without a profile.
  pub languages: Vec<String>,
}

pub fn check_github(role: &str, repos: &[RepoLanguages]) -> GithubCheck {
  let seen: BTreeSet<&str> = repos
    .iter()
    .flat_map(|repo| repo.languages.iter().map(String::as_str))
    .collect();

  let Some(profile) = role_profile(role) else {
    return GithubCheck {
      qualified: !repos.is_empty(),
      languages: seen.into_iter().map(str::to_owned).collect(),
    };
  };

  let matched: Vec<String> = seen
    .into_iter()
    .filter(|language| profile.languages.iter().any(|wanted| wanted.eq_ignore_ascii_case(language)))
    .map(str::to_owned)
    .collect();

  GithubCheck {
    qualified: !matched.is_empty(),
    languages: matched,
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn repo(name: &str, languages: &[&str]) -> RepoLanguages {
    RepoLanguages {
      name: name.to_string(),
      languages: languages.iter().map(|l| l.to_string()).collect(),
    }
  }

  #[test]
  fn test_cv_needs_every_role_skill() {
    let check = check_cv("Built React apps in JavaScript with CSS and semantic HTML", "Frontend Developer");
    assert!(check.qualified);
    assert_eq!(check.found, vec!["react", "javascript", "css", "html"]);

    let check = check_cv("Figma wireframes", "ui/ux designer");
    assert!(!check.qualified);
    assert_eq!(check.found, vec!["figma", "wireframe"]);
    assert_eq!(check.missing, vec!["adobe", "sketch", "prototype"]);
  }

  #[test]
  fn test_roles_without_profile_accept_any_cv() {
    assert!(check_cv("Ten years of hardware prototyping", "Builder").qualified);
    assert!(!check_cv("  ", "Builder").qualified);
  }

  #[test]
  fn test_github_username_forms() {
    assert_eq!(github_username("https://github.com/wanjiku/"), Some("wanjiku".to_string()));
    assert_eq!(github_username("github.com/otieno-dev?tab=repositories"), Some("otieno-dev".to_string()));
    assert_eq!(github_username("@achieng"), Some("achieng".to_string()));
    assert_eq!(github_username("not a user"), None);
    assert_eq!(github_username(""), None);
  }

  #[test]
  fn test_github_languages_per_role() {
    let repos = vec![repo("firmware", &["C", "Python"]), repo("site", &["HTML"])];

    let backend = check_github("Backend Developer", &repos);
    assert!(backend.qualified);
    assert_eq!(backend.languages, vec!["Python"]);

    assert!(!check_github("Frontend Developer", &[repo("firmware", &["C"])]).qualified);

    let builder = check_github("Builder", &repos);
    assert!(builder.qualified);
    assert_eq!(builder.languages, vec!["C", "HTML", "Python"]);
    assert!(!check_github("Builder", &[]).qualified);
  }
}
