//! Product Scanner Service
//!
//! A web backend that looks up a food product by barcode, derives dietary
//! certifications and health warnings from its ingredients and nutrients,
//! enriches it with AI-generated sustainability content, and returns one
//! consolidated JSON payload. A second feature finds farmers markets near a
//! US ZIP code.
//!
//! # Architecture
//!
//! ## Core Components
//!
//! * `api` - Axum routes, request/response types and shared state
//! * `scan` - The scan pipeline: lookup, classify, enrich, score
//! * `product` - Open Food Facts client and the product record
//! * `classify` - Keyword certification rules and nutrient warning thresholds
//! * `enrichment` - Concurrent fan-out of the five generation prompts
//! * `generation` - Text generator trait and the Groq (OpenAI-compatible) client
//! * `tolerant` - JSON extraction from loosely formatted model replies
//! * `scoring` - Sustainability, community and combined scores
//! * `markets` - ZIP geocoding, Overpass market search, haversine sorting
//! * `upload` - Image upload storage
//! * `config` - Environment configuration
//! * `error` - Error handling and HTTP response mapping
//!
//! ## Design
//!
//! ### Scan pipeline (`scan.rs`)
//! - The product lookup is the only step that can fail a scan
//! - Certifications and warnings are pure functions of the record
//! - Enrichment runs five prompts through a pool of four concurrent slots
//! - Any failed prompt is replaced by a documented default
//!
//! ### Market finder (`markets.rs`)
//! - ZIP codes are validated before any network call
//! - Results are sorted by great-circle distance and capped at ten
//!
//! # Environment Configuration
//!
//! ```bash
//! GROQ_API_KEY=your-key-here          # Enables AI enrichment when set
//! GROQ_MODEL=llama-3.1-8b-instant     # Chat model
//! HOST=127.0.0.1                      # Server host
//! PORT=5000                           # Server port
//! UPLOAD_DIR=uploads                  # Where uploaded images are stored
//! STATIC_DIR=static                   # Directory holding index.html
//! MARKET_RADIUS_MILES=25              # Market search radius
//! RUST_LOG=info                       # Logging level
//! ```
//!
//! Upstream base URLs can be overridden with `PRODUCT_API_BASE`,
//! `GEOCODE_API_BASE`, `OVERPASS_API_URL` and `GROQ_API_BASE`.
//!
//! # Error Handling
//!
//! Every error response has the shape `{"success": false, "error": "..."}`:
//! - 400 for missing or malformed input
//! - 404 for unknown barcodes and ZIP codes
//! - 413 for uploads over 16MB
//! - 500 for upstream timeouts, network failures and anything unexpected
//!
//! # API Endpoints
//!
//! ## POST /scan
//!
//! ### Request
//! ```json
//! {
//!   "barcode": "3017620422003",
//!   "filters": { "dietary": ["vegan"], "health": ["low-sugar"] }
//! }
//! ```
//!
//! ### Response
//! ```json
//! {
//!   "success": true,
//!   "barcode": "3017620422003",
//!   "name": "Nutella",
//!   "nutriscore": "E",
//!   "ecoscore": "N/A",
//!   "nutriments": { "sugars": 56.3, "fiber": "N/A", "...": "..." },
//!   "certifications": { "vegan": false, "halal": true, "kosher": true },
//!   "health_warnings": [{ "title": "High Sugar", "message": "...", "severity": "high" }],
//!   "nutriscore_summary": "...",
//!   "ecoscore_summary": "Eco-Score: N/A",
//!   "sustainability_metrics": { "emissions": { "score": 4, "explanation": "..." }, "...": {} },
//!   "waste_tips": ["..."],
//!   "alternatives": [{ "name": "...", "brand": "...", "reason": "..." }],
//!   "ai_generated": true,
//!   "sustainability_score": 45.0,
//!   "community_actions": [{ "action": "...", "description": "...", "impact_score": 8 }],
//!   "community_score": 80.0,
//!   "combined_score": 62.5
//! }
//! ```
//!
//! ## POST /find-markets
//!
//! ### Request
//! ```json
//! { "zipcode": "10001" }
//! ```
//!
//! ### Response
//! ```json
//! {
//!   "success": true,
//!   "zipcode": "10001",
//!   "location": { "place": "New York City", "state": "New York", "coordinates": { "lat": 40.75, "lon": -73.99 } },
//!   "count": 1,
//!   "markets": [{ "name": "Union Square Greenmarket", "type": "Farmers Market", "address": "...", "city": "New York", "distance": 1.2, "coordinates": { "lat": 40.73, "lon": -73.99 } }]
//! }
//! ```
//!
//! ## POST /upload
//! Multipart form with a `file` field (png, jpg, jpeg or gif, at most 16MB).
//! The image is stored; barcode extraction from images is not implemented.
//!
//! ## GET /
//! Serves `index.html` from the static directory.

pub mod api;
pub mod classify;
pub mod config;
pub mod enrichment;
pub mod error;
pub mod generation;
pub mod markets;
pub mod product;
pub mod scan;
pub mod scoring;
pub mod tolerant;
pub mod upload;
