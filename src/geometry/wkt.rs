//! Well-known-text reading and writing for diagnostics and tests

use super::{
    Geometry, GeometryBackend, GeometryCollection, LineString, MultiPolygon, Point, Polygon,
};
use crate::types::{MatchError, MatchResult};

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Word(String),
    Number(f64),
    Open,
    Close,
    Comma,
}

fn tokenize(text: &str) -> MatchResult<Vec<Token>> {
    let mut tokens = Vec::new();
    let mut chars = text.char_indices().peekable();

    while let Some(&(start, c)) = chars.peek() {
        match c {
            c if c.is_whitespace() => {
                chars.next();
            }
            '(' => {
                chars.next();
                tokens.push(Token::Open);
            }
            ')' => {
                chars.next();
                tokens.push(Token::Close);
            }
            ',' => {
                chars.next();
                tokens.push(Token::Comma);
            }
            c if c.is_ascii_alphabetic() => {
                let mut end = start;
                while let Some(&(i, c)) = chars.peek() {
                    if !c.is_ascii_alphabetic() {
                        break;
                    }
                    end = i + c.len_utf8();
                    chars.next();
                }
                tokens.push(Token::Word(text[start..end].to_uppercase()));
            }
            c if c.is_ascii_digit() || c == '-' || c == '+' || c == '.' => {
                let mut end = start;
                while let Some(&(i, c)) = chars.peek() {
                    if !(c.is_ascii_digit() || matches!(c, '-' | '+' | '.' | 'e' | 'E')) {
                        break;
                    }
                    end = i + c.len_utf8();
                    chars.next();
                }
                let literal = &text[start..end];
                let value = literal.parse::<f64>().map_err(|_| {
                    MatchError::WktParse(format!("Invalid number '{}'", literal))
                })?;
                tokens.push(Token::Number(value));
            }
            other => {
                return Err(MatchError::WktParse(format!(
                    "Unexpected character '{}' at position {}",
                    other, start
                )))
            }
        }
    }
    Ok(tokens)
}

struct Parser {
    tokens: Vec<Token>,
    position: usize,
    backend: &'static dyn GeometryBackend,
}

impl Parser {
    fn next(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.position).cloned();
        self.position += 1;
        token
    }

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.position)
    }

    fn expect(&mut self, expected: Token) -> MatchResult<()> {
        match self.next() {
            Some(token) if token == expected => Ok(()),
            other => Err(MatchError::WktParse(format!(
                "Expected {:?}, found {:?}",
                expected, other
            ))),
        }
    }

    fn is_empty_marker(&mut self) -> bool {
        if matches!(self.peek(), Some(Token::Word(w)) if w == "EMPTY") {
            self.position += 1;
            true
        } else {
            false
        }
    }

    fn geometry(&mut self) -> MatchResult<Geometry> {
        let keyword = match self.next() {
            Some(Token::Word(word)) => word,
            other => {
                return Err(MatchError::WktParse(format!(
                    "Expected geometry type, found {:?}",
                    other
                )))
            }
        };

        match keyword.as_str() {
            "POINT" => {
                self.expect(Token::Open)?;
                let point = self.coordinate()?;
                self.expect(Token::Close)?;
                Ok(Geometry::Point(point))
            }
            "LINESTRING" => {
                if self.is_empty_marker() {
                    return Ok(Geometry::LineString(LineString::new(Vec::new(), self.backend)));
                }
                let points = self.coordinate_list()?;
                Ok(Geometry::LineString(LineString::new(points, self.backend)))
            }
            "POLYGON" => {
                if self.is_empty_marker() {
                    return Ok(Geometry::Polygon(Polygon::empty(self.backend)));
                }
                Ok(Geometry::Polygon(self.polygon_body()?))
            }
            "MULTIPOLYGON" => {
                if self.is_empty_marker() {
                    return Ok(Geometry::MultiPolygon(MultiPolygon::default()));
                }
                self.expect(Token::Open)?;
                let mut polygons = vec![self.polygon_body()?];
                while self.peek() == Some(&Token::Comma) {
                    self.position += 1;
                    polygons.push(self.polygon_body()?);
                }
                self.expect(Token::Close)?;
                Ok(Geometry::MultiPolygon(MultiPolygon::new(polygons)))
            }
            "GEOMETRYCOLLECTION" => {
                if self.is_empty_marker() {
                    return Ok(Geometry::empty());
                }
                self.expect(Token::Open)?;
                let mut members = vec![self.geometry()?];
                while self.peek() == Some(&Token::Comma) {
                    self.position += 1;
                    members.push(self.geometry()?);
                }
                self.expect(Token::Close)?;
                Ok(Geometry::Collection(GeometryCollection::new(members)))
            }
            other => Err(MatchError::WktParse(format!(
                "Unsupported geometry type: {}",
                other
            ))),
        }
    }

    fn polygon_body(&mut self) -> MatchResult<Polygon> {
        self.expect(Token::Open)?;
        let exterior = self.coordinate_list()?;
        if self.peek() == Some(&Token::Comma) {
            return Err(MatchError::WktParse(
                "Polygons with holes are not supported".to_string(),
            ));
        }
        self.expect(Token::Close)?;
        Ok(Polygon::new(&exterior, self.backend))
    }

    fn coordinate_list(&mut self) -> MatchResult<Vec<Point>> {
        self.expect(Token::Open)?;
        let mut points = vec![self.coordinate()?];
        while self.peek() == Some(&Token::Comma) {
            self.position += 1;
            points.push(self.coordinate()?);
        }
        self.expect(Token::Close)?;
        Ok(points)
    }

    fn coordinate(&mut self) -> MatchResult<Point> {
        match (self.next(), self.next()) {
            (Some(Token::Number(lon)), Some(Token::Number(lat))) => Ok(Point::new(lon, lat)),
            (first, second) => Err(MatchError::WktParse(format!(
                "Expected coordinate pair, found {:?} {:?}",
                first, second
            ))),
        }
    }
}

/// Parses WKT into geometry bound to `backend`
pub fn parse(text: &str, backend: &'static dyn GeometryBackend) -> MatchResult<Geometry> {
    let mut parser = Parser {
        tokens: tokenize(text)?,
        position: 0,
        backend,
    };
    let geometry = parser.geometry()?;
    if parser.position < parser.tokens.len() {
        return Err(MatchError::WktParse(format!(
            "Trailing content after geometry in '{}'",
            text
        )));
    }
    Ok(geometry)
}

fn coordinate_text(points: &[Point]) -> String {
    points
        .iter()
        .map(|p| format!("{} {}", p.lon, p.lat))
        .collect::<Vec<_>>()
        .join(",")
}

fn polygon_text(polygon: &Polygon) -> String {
    format!("(({}))", coordinate_text(&polygon.coordinates()))
}

pub fn format(geometry: &Geometry) -> String {
    match geometry {
        Geometry::Point(point) => point.to_string(),
        Geometry::LineString(line) if line.is_empty() => "LINESTRING EMPTY".to_string(),
        Geometry::LineString(line) => format!("LINESTRING({})", coordinate_text(line.points())),
        Geometry::Polygon(polygon) if polygon.is_empty() => "POLYGON EMPTY".to_string(),
        Geometry::Polygon(polygon) => format!("POLYGON{}", polygon_text(polygon)),
        Geometry::MultiPolygon(multi) if multi.polygons().is_empty() => {
            "MULTIPOLYGON EMPTY".to_string()
        }
        Geometry::MultiPolygon(multi) => format_multi_polygon(multi.polygons()),
        Geometry::Collection(collection) if collection.geometries().is_empty() => {
            "GEOMETRYCOLLECTION EMPTY".to_string()
        }
        Geometry::Collection(collection) => format!(
            "GEOMETRYCOLLECTION({})",
            collection
                .geometries()
                .iter()
                .map(format)
                .collect::<Vec<_>>()
                .join(",")
        ),
    }
}

pub fn format_multi_polygon(polygons: &[Polygon]) -> String {
    format!(
        "MULTIPOLYGON({})",
        polygons
            .iter()
            .map(polygon_text)
            .collect::<Vec<_>>()
            .join(",")
    )
}
