//! Hand-assembled OpenAPI 3.1 description of the HTTP surface.
//!
//! Served by `GET /api/openapi`. The document is built once per request
//! from literals; it has no runtime inputs.

use serde_json::{Value, json};

fn id_param(description: &str) -> Value {
    json!({
        "name": "id",
        "in": "path",
        "required": true,
        "schema": { "type": "integer", "format": "int64", "minimum": 1 },
        "description": description
    })
}

fn error_response(description: &str) -> Value {
    json!({
        "description": description,
        "content": {
            "application/json": {
                "schema": { "$ref": "#/components/schemas/Error" }
            }
        }
    })
}

fn data_response(description: &str, schema: Value) -> Value {
    json!({
        "description": description,
        "content": {
            "application/json": {
                "schema": {
                    "type": "object",
                    "properties": { "data": schema }
                }
            }
        }
    })
}

fn page_response(description: &str, item_ref: &str) -> Value {
    json!({
        "description": description,
        "content": {
            "application/json": {
                "schema": {
                    "type": "object",
                    "properties": {
                        "data": { "type": "array", "items": { "$ref": item_ref } },
                        "pagination": { "$ref": "#/components/schemas/Pagination" }
                    }
                }
            }
        }
    })
}

fn schema_ref(name: &str) -> Value {
    json!({ "$ref": format!("#/components/schemas/{name}") })
}

/// The full document.
pub fn document() -> Value {
    json!({
        "openapi": "3.1.0",
        "info": {
            "title": "Bugtrack API",
            "version": env!("CARGO_PKG_VERSION"),
            "description": "Bug tracking: users, projects, membership, bugs, comments, change history, and file attachments."
        },
        "servers": [ { "url": "/api" } ],
        "paths": {
            "/health": {
                "get": {
                    "summary": "Liveness probe",
                    "tags": ["meta"],
                    "responses": {
                        "200": {
                            "description": "Service is up",
                            "content": {
                                "application/json": {
                                    "schema": {
                                        "type": "object",
                                        "properties": {
                                            "status": { "type": "string" },
                                            "uptime": { "type": "number" },
                                            "timestamp": { "type": "integer", "format": "int64" }
                                        }
                                    }
                                }
                            }
                        },
                        "429": error_response("Rate limit exceeded")
                    }
                }
            },
            "/users": {
                "get": {
                    "summary": "List users",
                    "tags": ["users"],
                    "parameters": [
                        { "name": "role", "in": "query", "schema": { "$ref": "#/components/schemas/UserRole" } },
                        { "name": "search", "in": "query", "schema": { "type": "string" }, "description": "Matches name or email, case-insensitive" },
                        { "name": "page", "in": "query", "schema": { "type": "integer", "minimum": 1 } },
                        { "name": "pageSize", "in": "query", "schema": { "type": "integer", "minimum": 1, "maximum": 100 } }
                    ],
                    "responses": { "200": page_response("One page of users", "#/components/schemas/User") }
                },
                "post": {
                    "summary": "Create a user",
                    "tags": ["users"],
                    "requestBody": {
                        "required": true,
                        "content": { "application/json": { "schema": schema_ref("CreateUser") } }
                    },
                    "responses": {
                        "201": data_response("Created user", schema_ref("User")),
                        "400": error_response("Validation failed"),
                        "409": error_response("Email already in use")
                    }
                }
            },
            "/users/{id}": {
                "parameters": [ id_param("User id") ],
                "get": {
                    "summary": "Fetch a user",
                    "tags": ["users"],
                    "responses": {
                        "200": data_response("The user", schema_ref("User")),
                        "404": error_response("User not found")
                    }
                },
                "patch": {
                    "summary": "Update a user",
                    "tags": ["users"],
                    "requestBody": {
                        "content": { "application/json": { "schema": schema_ref("UpdateUser") } }
                    },
                    "responses": {
                        "200": data_response("Updated user", schema_ref("User")),
                        "404": error_response("User not found"),
                        "409": error_response("Email already in use")
                    }
                },
                "delete": {
                    "summary": "Delete a user",
                    "tags": ["users"],
                    "responses": {
                        "200": data_response("Deleted user", schema_ref("User")),
                        "404": error_response("User not found")
                    }
                }
            },
            "/projects": {
                "get": {
                    "summary": "List projects",
                    "tags": ["projects"],
                    "parameters": [
                        { "name": "status", "in": "query", "schema": { "$ref": "#/components/schemas/ProjectStatus" } },
                        { "name": "search", "in": "query", "schema": { "type": "string" }, "description": "Matches name or key, case-insensitive" },
                        { "name": "page", "in": "query", "schema": { "type": "integer", "minimum": 1 } },
                        { "name": "pageSize", "in": "query", "schema": { "type": "integer", "minimum": 1, "maximum": 100 } }
                    ],
                    "responses": { "200": page_response("One page of projects", "#/components/schemas/Project") }
                },
                "post": {
                    "summary": "Create a project",
                    "tags": ["projects"],
                    "requestBody": {
                        "required": true,
                        "content": { "application/json": { "schema": schema_ref("CreateProject") } }
                    },
                    "responses": {
                        "201": data_response("Created project", schema_ref("Project")),
                        "400": error_response("Validation failed or unknown owner"),
                        "409": error_response("Key already in use")
                    }
                }
            },
            "/projects/{id}": {
                "parameters": [ id_param("Project id") ],
                "get": {
                    "summary": "Fetch a project",
                    "tags": ["projects"],
                    "responses": {
                        "200": data_response("The project", schema_ref("Project")),
                        "404": error_response("Project not found")
                    }
                },
                "patch": {
                    "summary": "Update a project",
                    "tags": ["projects"],
                    "requestBody": {
                        "content": { "application/json": { "schema": schema_ref("UpdateProject") } }
                    },
                    "responses": {
                        "200": data_response("Updated project", schema_ref("Project")),
                        "404": error_response("Project not found"),
                        "409": error_response("Key already in use")
                    }
                },
                "delete": {
                    "summary": "Delete a project",
                    "tags": ["projects"],
                    "responses": {
                        "200": data_response("Deleted project", schema_ref("Project")),
                        "404": error_response("Project not found")
                    }
                }
            },
            "/projects/{id}/members": {
                "parameters": [ id_param("Project id") ],
                "get": {
                    "summary": "List project members with their user rows",
                    "tags": ["members"],
                    "responses": {
                        "200": data_response("Members, oldest first", json!({ "type": "array", "items": schema_ref("Member") })),
                        "404": error_response("Project not found")
                    }
                },
                "post": {
                    "summary": "Add a member",
                    "tags": ["members"],
                    "requestBody": {
                        "required": true,
                        "content": { "application/json": { "schema": schema_ref("AddMember") } }
                    },
                    "responses": {
                        "201": data_response("Added member", schema_ref("Member")),
                        "404": error_response("Project or user not found"),
                        "409": error_response("Already a member")
                    }
                },
                "delete": {
                    "summary": "Remove a member",
                    "tags": ["members"],
                    "requestBody": {
                        "required": true,
                        "content": {
                            "application/json": {
                                "schema": {
                                    "type": "object",
                                    "required": ["userId"],
                                    "properties": { "userId": { "type": "integer", "format": "int64" } }
                                }
                            }
                        }
                    },
                    "responses": {
                        "200": data_response("Removed membership row", schema_ref("Member")),
                        "404": error_response("Project or membership not found")
                    }
                }
            },
            "/projects/{id}/attachments": {
                "parameters": [ id_param("Project id") ],
                "get": {
                    "summary": "List a project's attachments",
                    "tags": ["attachments"],
                    "parameters": [
                        { "name": "page", "in": "query", "schema": { "type": "integer", "minimum": 1 } },
                        { "name": "pageSize", "in": "query", "schema": { "type": "integer", "minimum": 1, "maximum": 100 } },
                        { "name": "sort", "in": "query", "schema": { "type": "string", "enum": ["filename", "createdAt"] } },
                        { "name": "order", "in": "query", "schema": { "type": "string", "enum": ["asc", "desc"] } }
                    ],
                    "responses": {
                        "200": page_response("Attachments with uploader, hasNext/hasPrevious flags", "#/components/schemas/Attachment"),
                        "404": error_response("Project not found")
                    }
                }
            },
            "/bugs": {
                "get": {
                    "summary": "List bugs with embedded project and reporter",
                    "tags": ["bugs"],
                    "parameters": [
                        { "name": "status", "in": "query", "schema": { "$ref": "#/components/schemas/BugStatus" } },
                        { "name": "priority", "in": "query", "schema": { "$ref": "#/components/schemas/BugPriority" } },
                        { "name": "projectId", "in": "query", "schema": { "type": "integer", "format": "int64" } },
                        { "name": "assigneeId", "in": "query", "schema": { "type": "integer", "format": "int64" } },
                        { "name": "search", "in": "query", "schema": { "type": "string" }, "description": "Matches title or description, case-insensitive" },
                        { "name": "page", "in": "query", "schema": { "type": "integer", "minimum": 1 } },
                        { "name": "pageSize", "in": "query", "schema": { "type": "integer", "minimum": 1, "maximum": 100 } }
                    ],
                    "responses": { "200": page_response("One page of bugs", "#/components/schemas/Bug") }
                },
                "post": {
                    "summary": "Report a bug",
                    "tags": ["bugs"],
                    "requestBody": {
                        "required": true,
                        "content": { "application/json": { "schema": schema_ref("CreateBug") } }
                    },
                    "responses": {
                        "201": data_response("Created bug; priority defaults to medium, status to open", schema_ref("Bug")),
                        "400": error_response("Validation failed or dangling projectId/reporterId/assigneeId")
                    }
                }
            },
            "/bugs/{id}": {
                "parameters": [ id_param("Bug id") ],
                "get": {
                    "summary": "Fetch a bug with embedded project and reporter",
                    "tags": ["bugs"],
                    "responses": {
                        "200": data_response("The bug", schema_ref("Bug")),
                        "404": error_response("Bug not found")
                    }
                },
                "patch": {
                    "summary": "Update a bug; changed fields are recorded in the history",
                    "tags": ["bugs"],
                    "requestBody": {
                        "content": { "application/json": { "schema": schema_ref("UpdateBug") } }
                    },
                    "responses": {
                        "200": data_response("Updated bug", schema_ref("Bug")),
                        "400": error_response("Validation failed or dangling reference"),
                        "404": error_response("Bug not found")
                    }
                },
                "delete": {
                    "summary": "Delete a bug",
                    "tags": ["bugs"],
                    "responses": {
                        "200": data_response("Deleted bug", schema_ref("Bug")),
                        "404": error_response("Bug not found")
                    }
                }
            },
            "/bugs/{id}/comments": {
                "parameters": [ id_param("Bug id") ],
                "get": {
                    "summary": "Comments on a bug, newest first",
                    "tags": ["comments"],
                    "responses": {
                        "200": data_response("Comments with author", json!({ "type": "array", "items": schema_ref("Comment") })),
                        "404": error_response("Bug not found")
                    }
                },
                "post": {
                    "summary": "Comment on a bug",
                    "tags": ["comments"],
                    "requestBody": {
                        "required": true,
                        "content": { "application/json": { "schema": schema_ref("CreateComment") } }
                    },
                    "responses": {
                        "201": data_response("Created comment", schema_ref("Comment")),
                        "400": error_response("Validation failed"),
                        "404": error_response("Bug or author not found")
                    }
                }
            },
            "/bugs/{id}/history": {
                "parameters": [ id_param("Bug id") ],
                "get": {
                    "summary": "Field-level change history, newest first",
                    "tags": ["bugs"],
                    "responses": {
                        "200": data_response("History entries with actor", json!({ "type": "array", "items": schema_ref("HistoryEntry") })),
                        "404": error_response("Bug not found")
                    }
                }
            },
            "/bugs/{id}/attachments": {
                "parameters": [ id_param("Bug id") ],
                "get": {
                    "summary": "List a bug's attachments",
                    "tags": ["attachments"],
                    "parameters": [
                        { "name": "page", "in": "query", "schema": { "type": "integer", "minimum": 1 } },
                        { "name": "pageSize", "in": "query", "schema": { "type": "integer", "minimum": 1, "maximum": 100 } },
                        { "name": "sort", "in": "query", "schema": { "type": "string", "enum": ["filename", "createdAt", "size"] } },
                        { "name": "order", "in": "query", "schema": { "type": "string", "enum": ["asc", "desc"] } }
                    ],
                    "responses": {
                        "200": page_response("Attachments with uploader", "#/components/schemas/Attachment"),
                        "404": error_response("Bug not found")
                    }
                }
            },
            "/comments/{id}": {
                "parameters": [ id_param("Comment id") ],
                "get": {
                    "summary": "Fetch a comment with its author",
                    "tags": ["comments"],
                    "responses": {
                        "200": data_response("The comment", schema_ref("Comment")),
                        "404": error_response("Comment not found")
                    }
                },
                "put": {
                    "summary": "Replace a comment's body",
                    "tags": ["comments"],
                    "requestBody": {
                        "required": true,
                        "content": {
                            "application/json": {
                                "schema": {
                                    "type": "object",
                                    "required": ["body"],
                                    "properties": { "body": { "type": "string", "minLength": 1 } }
                                }
                            }
                        }
                    },
                    "responses": {
                        "200": data_response("Updated comment", schema_ref("Comment")),
                        "404": error_response("Comment not found")
                    }
                },
                "delete": {
                    "summary": "Delete a comment",
                    "tags": ["comments"],
                    "responses": {
                        "200": data_response("Deleted comment", schema_ref("Comment")),
                        "404": error_response("Comment not found")
                    }
                }
            },
            "/attachments": {
                "get": {
                    "summary": "List attachments, offset style",
                    "tags": ["attachments"],
                    "parameters": [
                        { "name": "limit", "in": "query", "schema": { "type": "integer", "minimum": 1, "maximum": 100 } },
                        { "name": "offset", "in": "query", "schema": { "type": "integer", "minimum": 0 } },
                        { "name": "issueId", "in": "query", "schema": { "type": "integer", "format": "int64" } },
                        { "name": "projectId", "in": "query", "schema": { "type": "integer", "format": "int64" } },
                        { "name": "sort", "in": "query", "schema": { "type": "string", "enum": ["filename", "createdAt", "size"] } },
                        { "name": "order", "in": "query", "schema": { "type": "string", "enum": ["asc", "desc"] } }
                    ],
                    "responses": { "200": page_response("One window of attachments", "#/components/schemas/Attachment") }
                },
                "post": {
                    "summary": "Upload a file (multipart/form-data)",
                    "tags": ["attachments"],
                    "requestBody": {
                        "required": true,
                        "content": {
                            "multipart/form-data": {
                                "schema": {
                                    "type": "object",
                                    "required": ["file"],
                                    "properties": {
                                        "file": { "type": "string", "format": "binary" },
                                        "issueId": { "type": "string" },
                                        "projectId": { "type": "string" }
                                    }
                                }
                            }
                        }
                    },
                    "responses": {
                        "201": data_response("Stored attachment", schema_ref("Attachment")),
                        "400": error_response("Missing file part"),
                        "404": error_response("Linked bug or project not found"),
                        "413": error_response("File exceeds the 10 MB cap"),
                        "422": error_response("MIME type not allowed")
                    }
                },
                "delete": {
                    "summary": "Delete an attachment by the id query parameter",
                    "tags": ["attachments"],
                    "parameters": [
                        { "name": "id", "in": "query", "required": true, "schema": { "type": "integer", "format": "int64", "minimum": 1 } }
                    ],
                    "responses": {
                        "200": data_response("Deleted attachment", schema_ref("Attachment")),
                        "400": error_response("Missing or invalid id"),
                        "404": error_response("Attachment not found")
                    }
                }
            },
            "/attachments/{id}": {
                "parameters": [ id_param("Attachment id") ],
                "get": {
                    "summary": "Fetch an attachment with uploader, bug, and project references",
                    "tags": ["attachments"],
                    "responses": {
                        "200": data_response("The attachment", schema_ref("Attachment")),
                        "404": error_response("Attachment not found")
                    }
                },
                "delete": {
                    "summary": "Delete an attachment",
                    "tags": ["attachments"],
                    "responses": {
                        "200": data_response("Deleted attachment", schema_ref("Attachment")),
                        "404": error_response("Attachment not found")
                    }
                }
            }
        },
        "components": {
            "schemas": {
                "Error": {
                    "type": "object",
                    "required": ["error", "code"],
                    "properties": {
                        "error": { "type": "string" },
                        "code": { "type": "string" },
                        "details": { "type": "object" }
                    }
                },
                "Pagination": {
                    "type": "object",
                    "properties": {
                        "page": { "type": "integer" },
                        "pageSize": { "type": "integer" },
                        "total": { "type": "integer" },
                        "totalPages": { "type": "integer" },
                        "offset": { "type": "integer" },
                        "hasNext": { "type": "boolean" },
                        "hasPrevious": { "type": "boolean" }
                    }
                },
                "UserRole": { "type": "string", "enum": ["admin", "manager", "developer", "tester"] },
                "ProjectStatus": { "type": "string", "enum": ["active", "archived"] },
                "MemberRole": { "type": "string", "enum": ["owner", "maintainer", "contributor", "viewer"] },
                "BugStatus": { "type": "string", "enum": ["open", "in_progress", "resolved", "closed"] },
                "BugPriority": { "type": "string", "enum": ["low", "medium", "high", "critical"] },
                "User": {
                    "type": "object",
                    "properties": {
                        "id": { "type": "integer", "format": "int64" },
                        "name": { "type": "string" },
                        "email": { "type": "string", "format": "email" },
                        "role": { "$ref": "#/components/schemas/UserRole" },
                        "image": { "type": ["string", "null"] },
                        "createdAt": { "type": "string", "format": "date-time" },
                        "updatedAt": { "type": "string", "format": "date-time" }
                    }
                },
                "Project": {
                    "type": "object",
                    "properties": {
                        "id": { "type": "integer", "format": "int64" },
                        "name": { "type": "string" },
                        "key": { "type": "string", "pattern": "^[A-Z]{2,5}$" },
                        "description": { "type": ["string", "null"] },
                        "status": { "$ref": "#/components/schemas/ProjectStatus" },
                        "ownerId": { "type": "integer", "format": "int64" },
                        "createdAt": { "type": "string", "format": "date-time" },
                        "updatedAt": { "type": "string", "format": "date-time" }
                    }
                },
                "Member": {
                    "type": "object",
                    "properties": {
                        "id": { "type": "integer", "format": "int64" },
                        "userId": { "type": "integer", "format": "int64" },
                        "role": { "$ref": "#/components/schemas/MemberRole" },
                        "createdAt": { "type": "string", "format": "date-time" },
                        "user": { "type": "object" }
                    }
                },
                "Bug": {
                    "type": "object",
                    "properties": {
                        "id": { "type": "integer", "format": "int64" },
                        "projectId": { "type": "integer", "format": "int64" },
                        "title": { "type": "string" },
                        "description": { "type": "string" },
                        "priority": { "$ref": "#/components/schemas/BugPriority" },
                        "status": { "$ref": "#/components/schemas/BugStatus" },
                        "reporterId": { "type": "integer", "format": "int64" },
                        "assigneeId": { "type": ["integer", "null"], "format": "int64" },
                        "createdAt": { "type": "string", "format": "date-time" },
                        "updatedAt": { "type": "string", "format": "date-time" }
                    }
                },
                "Comment": {
                    "type": "object",
                    "properties": {
                        "id": { "type": "integer", "format": "int64" },
                        "bugId": { "type": "integer", "format": "int64" },
                        "authorId": { "type": "integer", "format": "int64" },
                        "body": { "type": "string" },
                        "createdAt": { "type": "string", "format": "date-time" },
                        "updatedAt": { "type": "string", "format": "date-time" }
                    }
                },
                "HistoryEntry": {
                    "type": "object",
                    "properties": {
                        "id": { "type": "integer", "format": "int64" },
                        "bugId": { "type": "integer", "format": "int64" },
                        "userId": { "type": ["integer", "null"], "format": "int64" },
                        "field": { "type": "string" },
                        "oldValue": { "type": ["string", "null"] },
                        "newValue": { "type": ["string", "null"] },
                        "createdAt": { "type": "string", "format": "date-time" }
                    }
                },
                "Attachment": {
                    "type": "object",
                    "properties": {
                        "id": { "type": "integer", "format": "int64" },
                        "filename": { "type": "string" },
                        "storedName": { "type": "string" },
                        "path": { "type": "string" },
                        "mime": { "type": "string" },
                        "size": { "type": "integer", "format": "int64" },
                        "issueId": { "type": ["integer", "null"], "format": "int64" },
                        "projectId": { "type": ["integer", "null"], "format": "int64" },
                        "uploaderId": { "type": ["integer", "null"], "format": "int64" },
                        "createdAt": { "type": "string", "format": "date-time" }
                    }
                },
                "CreateUser": {
                    "type": "object",
                    "required": ["name", "email"],
                    "properties": {
                        "name": { "type": "string", "minLength": 1, "maxLength": 255 },
                        "email": { "type": "string", "format": "email" },
                        "role": { "$ref": "#/components/schemas/UserRole" },
                        "image": { "type": "string", "format": "uri" }
                    }
                },
                "UpdateUser": {
                    "type": "object",
                    "properties": {
                        "name": { "type": "string", "minLength": 1, "maxLength": 255 },
                        "email": { "type": "string", "format": "email" },
                        "role": { "$ref": "#/components/schemas/UserRole" },
                        "image": { "type": "string", "format": "uri" }
                    }
                },
                "CreateProject": {
                    "type": "object",
                    "required": ["name", "key", "ownerId"],
                    "properties": {
                        "name": { "type": "string", "minLength": 1, "maxLength": 255 },
                        "key": { "type": "string", "description": "2-5 letters, uppercased before validation" },
                        "description": { "type": "string" },
                        "status": { "$ref": "#/components/schemas/ProjectStatus" },
                        "ownerId": { "type": "integer", "format": "int64" }
                    }
                },
                "UpdateProject": {
                    "type": "object",
                    "properties": {
                        "name": { "type": "string", "minLength": 1, "maxLength": 255 },
                        "key": { "type": "string" },
                        "description": { "type": "string" },
                        "status": { "$ref": "#/components/schemas/ProjectStatus" },
                        "ownerId": { "type": "integer", "format": "int64" }
                    }
                },
                "AddMember": {
                    "type": "object",
                    "required": ["userId", "role"],
                    "properties": {
                        "userId": { "type": "integer", "format": "int64", "minimum": 1 },
                        "role": { "$ref": "#/components/schemas/MemberRole" }
                    }
                },
                "CreateBug": {
                    "type": "object",
                    "required": ["projectId", "title", "description", "reporterId"],
                    "properties": {
                        "projectId": { "type": "integer", "format": "int64", "minimum": 1 },
                        "title": { "type": "string", "minLength": 1, "maxLength": 255 },
                        "description": { "type": "string", "minLength": 1 },
                        "priority": { "$ref": "#/components/schemas/BugPriority" },
                        "status": { "$ref": "#/components/schemas/BugStatus" },
                        "reporterId": { "type": "integer", "format": "int64", "minimum": 1 },
                        "assigneeId": { "type": "integer", "format": "int64", "minimum": 1 }
                    }
                },
                "UpdateBug": {
                    "type": "object",
                    "properties": {
                        "title": { "type": "string", "minLength": 1, "maxLength": 255 },
                        "description": { "type": "string", "minLength": 1 },
                        "priority": { "$ref": "#/components/schemas/BugPriority" },
                        "status": { "$ref": "#/components/schemas/BugStatus" },
                        "projectId": { "type": "integer", "format": "int64", "minimum": 1 },
                        "assigneeId": { "type": ["integer", "null"], "format": "int64", "description": "Explicit null unassigns" }
                    }
                },
                "CreateComment": {
                    "type": "object",
                    "required": ["authorId", "body"],
                    "properties": {
                        "authorId": { "type": "integer", "format": "int64", "minimum": 1 },
                        "body": { "type": "string", "minLength": 1 }
                    }
                }
            }
        }
    })
}
