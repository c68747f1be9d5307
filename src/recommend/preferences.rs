use serde::{Deserialize, Serialize};

use crate::catalog::Track;

/// Rango de años inclusivo, siempre con `from <= to`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct YearRange {
    pub from: i32,
    pub to: i32,
}

impl YearRange {
    /// Construye el rango ordenando los extremos
    pub fn new(a: i32, b: i32) -> Self {
        Self {
            from: a.min(b),
            to: a.max(b),
        }
    }

    pub fn contains(&self, year: i32) -> bool {
        (self.from..=self.to).contains(&year)
    }

    /// Años fuera del rango; 0 si está dentro
    pub fn distance_from(&self, year: i32) -> u32 {
        if year < self.from {
            self.from.abs_diff(year)
        } else if year > self.to {
            year.abs_diff(self.to)
        } else {
            0
        }
    }

    /// Calificador de búsqueda del catálogo, p. ej. `year:1990-1999`
    pub fn search_qualifier(&self) -> String {
        format!("year:{}-{}", self.from, self.to)
    }
}

/// Registro estructurado de preferencias producido por el analizador externo.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PreferenceRecord {
    pub genres: Vec<String>,
    pub mood: String,
    pub energy: f32,
    pub valence: f32,
    pub danceability: f32,
    pub artists: Vec<String>,
    pub keywords: Vec<String>,
    pub year_range: Option<YearRange>,
}

impl Default for PreferenceRecord {
    fn default() -> Self {
        Self {
            genres: Vec::new(),
            mood: String::new(),
            energy: 0.5,
            valence: 0.5,
            danceability: 0.5,
            artists: Vec::new(),
            keywords: Vec::new(),
            year_range: None,
        }
    }
}

impl PreferenceRecord {
    /// Limita los atributos de audio a [0, 1] y ordena el rango de años
    pub fn normalized(mut self) -> Self {
        self.energy = clamp_unit(self.energy);
        self.valence = clamp_unit(self.valence);
        self.danceability = clamp_unit(self.danceability);
        self.year_range = self.year_range.map(|r| YearRange::new(r.from, r.to));
        self
    }
}

fn clamp_unit(value: f32) -> f32 {
    if value.is_nan() {
        0.5
    } else {
        value.clamp(0.0, 1.0)
    }
}

/// Petición de generación de una playlist
#[derive(Debug, Clone, Default)]
pub struct GenerationRequest {
    pub preferences: PreferenceRecord,
    /// Texto libre original del usuario
    pub raw_text: String,
    pub limit: usize,
    /// Sesión cuyo snapshot de top items puede sembrar la búsqueda
    pub session_id: Option<String>,
}

/// Resultado de una generación exitosa
#[derive(Debug, Clone, Serialize)]
pub struct Recommendation {
    pub tracks: Vec<Track>,
    pub genre_seeds: Vec<String>,
    pub year_range: Option<YearRange>,
    /// Nombres canónicos de los artistas reconocidos, para confirmar al usuario
    pub resolved_artists: Vec<String>,
    pub candidate_count: usize,
}
