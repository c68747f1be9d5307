use std::collections::HashSet;

/// Familia de géneros: los tags de artista que cuentan como el género pedido.
#[derive(Debug)]
pub struct GenreFamily {
    /// Palabra raíz; un tag que la contiene pertenece a la familia
    pub root: &'static str,
    /// Seeds del catálogo que piden esta familia
    pub seeds: &'static [&'static str],
    /// Tags concretos equivalentes
    pub hints: &'static [&'static str],
}

pub static GENRE_FAMILIES: &[GenreFamily] = &[
    GenreFamily {
        root: "rock",
        seeds: &["rock", "alt-rock", "hard-rock", "rock-n-roll", "psych-rock", "grunge", "punk-rock"],
        hints: &[
            "alternative rock", "classic rock", "hard rock", "indie rock", "modern rock",
            "album rock", "garage rock", "psychedelic rock", "korean rock", "j-rock",
            "britpop", "grunge", "post-grunge", "punk", "pop punk", "post-punk",
            "shoegaze", "emo", "permanent wave", "art rock", "soft rock", "blues rock",
        ],
    },
    GenreFamily {
        root: "metal",
        seeds: &["metal", "heavy-metal", "black-metal", "death-metal", "metalcore"],
        hints: &["metal", "heavy metal", "nu metal", "thrash metal", "metalcore", "djent"],
    },
    GenreFamily {
        root: "hip hop",
        seeds: &["hip-hop", "trap"],
        hints: &[
            "hip hop", "rap", "korean hip hop", "k-rap", "trap", "boom bap",
            "conscious hip hop", "underground hip hop", "pop rap", "drill",
        ],
    },
    GenreFamily {
        root: "r&b",
        seeds: &["r-n-b", "soul"],
        hints: &["r&b", "k-r&b", "neo soul", "contemporary r&b", "soul", "urban contemporary"],
    },
    GenreFamily {
        root: "k-pop",
        seeds: &["k-pop"],
        hints: &["k-pop", "k-pop boy group", "k-pop girl group", "korean pop", "k-ballad", "korean ost"],
    },
    GenreFamily {
        root: "pop",
        seeds: &["pop", "dance-pop", "synth-pop", "power-pop"],
        hints: &["pop", "dance pop", "electropop", "synthpop", "art pop", "indie pop", "bedroom pop", "pop dance"],
    },
    GenreFamily {
        root: "jazz",
        seeds: &["jazz"],
        hints: &["jazz", "smooth jazz", "vocal jazz", "cool jazz", "bebop", "jazz fusion", "korean jazz"],
    },
    GenreFamily {
        root: "electro",
        seeds: &["electronic", "edm", "house", "techno", "electro", "dubstep", "trance"],
        hints: &["edm", "house", "deep house", "techno", "trance", "dubstep", "electronica", "big room", "drum and bass"],
    },
    GenreFamily {
        root: "indie",
        seeds: &["indie", "indie-pop"],
        hints: &["indie", "k-indie", "korean indie", "indie folk", "indie rock", "indie pop", "lo-fi"],
    },
    GenreFamily {
        root: "folk",
        seeds: &["folk", "acoustic", "singer-songwriter"],
        hints: &["folk", "indie folk", "acoustic", "singer-songwriter", "folk-pop", "americana"],
    },
    GenreFamily {
        root: "classical",
        seeds: &["classical", "piano", "opera"],
        hints: &["classical", "orchestra", "compositional ambient", "early romantic era", "baroque", "opera"],
    },
    GenreFamily {
        root: "latin",
        seeds: &["latin", "reggaeton", "salsa"],
        hints: &["latin", "reggaeton", "latin pop", "urbano latino", "salsa", "bachata", "trap latino"],
    },
];

/// Busca la familia que corresponde a un seed del catálogo
pub fn family_for_seed(seed: &str) -> Option<&'static GenreFamily> {
    GENRE_FAMILIES
        .iter()
        .find(|family| family.seeds.contains(&seed))
}

/// Conjunto de pistas de género derivado de los seeds resueltos.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GenreHintSet {
    hints: HashSet<String>,
    roots: Vec<String>,
}

impl GenreHintSet {
    pub fn from_seeds(seeds: &[String]) -> Self {
        let mut set = Self::default();

        for seed in seeds {
            match family_for_seed(seed) {
                Some(family) => {
                    set.hints.extend(family.hints.iter().map(|h| h.to_string()));
                    set.push_root(family.root);
                }
                None => {
                    // Seed sin familia curada: el propio seed hace de pista
                    let spaced = seed.replace('-', " ");
                    set.hints.insert(seed.clone());
                    set.hints.insert(spaced.clone());
                    set.push_root(&spaced);
                }
            }
        }

        set
    }

    fn push_root(&mut self, root: &str) {
        if !self.roots.iter().any(|r| r == root) {
            self.roots.push(root.to_string());
        }
    }

    pub fn is_empty(&self) -> bool {
        self.hints.is_empty() && self.roots.is_empty()
    }

    pub fn matches_tag(&self, tag: &str) -> bool {
        let tag = tag.to_lowercase();
        self.hints.contains(&tag) || self.roots.iter().any(|root| tag.contains(root.as_str()))
    }

    /// ¿Alguno de los tags de los artistas cae en la familia?
    pub fn matches_any<'a, I>(&self, tags: I) -> bool
    where
        I: IntoIterator<Item = &'a String>,
    {
        tags.into_iter().any(|tag| self.matches_tag(tag))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seeds(values: &[&str]) -> Vec<String> {
        values.iter().map(|v| v.to_string()).collect()
    }

    #[test]
    fn rock_family_covers_subgenres() {
        let hints = GenreHintSet::from_seeds(&seeds(&["rock"]));
        assert!(hints.matches_tag("britpop"));
        assert!(hints.matches_tag("Korean Rock"));
        assert!(hints.matches_tag("rockabilly"));
        assert!(!hints.matches_tag("k-pop"));
    }

    #[test]
    fn alias_seeds_share_a_family() {
        assert_eq!(
            GenreHintSet::from_seeds(&seeds(&["alt-rock"])),
            GenreHintSet::from_seeds(&seeds(&["rock"]))
        );
    }

    #[test]
    fn unknown_seed_becomes_its_own_hint() {
        let hints = GenreHintSet::from_seeds(&seeds(&["bossa-nova"]));
        assert!(hints.matches_tag("bossa nova"));
        assert!(hints.matches_tag("bossa-nova"));
        assert!(!hints.matches_tag("samba"));
    }

    #[test]
    fn empty_seeds_match_nothing() {
        let hints = GenreHintSet::from_seeds(&[]);
        assert!(hints.is_empty());
        assert!(!hints.matches_any(&seeds(&["rock"])));
    }
}
